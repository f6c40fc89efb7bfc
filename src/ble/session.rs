//! One synchronization pass with the hub.
//!
//! Strict order per connection:
//!
//! 1. scan + connect + open service (`Link::connect`) - fatal on failure
//! 2. clock → local clock, `TimeUpdate`
//! 3. outbox flush (party mode, presence, audio) → `DataSent` per ack
//! 4. indoor then outdoor temperature / humidity
//! 5. window array
//! 6. garbage record, only at hour 0 or while unsynced
//! 7. transit block
//!
//! Missing or short characteristics are logged and skipped; the stored
//! value stays as it was. The outcome is reported as exactly one
//! `ConnectionFinished` or `ConnectionFailed`.
//!
//! A write queued while the panel is awake does not wait for the next
//! sync: `deliver` opens a connection of its own and runs only step 3.

use embassy_time::Instant;

use crate::ble::codec;
use crate::ble::{Characteristic, GattClient, Link};
use crate::clock::Clock;
use crate::config::BLE_MAX_VALUE_LEN;
use crate::error::{BleError, CharError};
use crate::event::{Event, EventSink};
use crate::fmt::{debug, info, warn};
use crate::state::SharedStore;

/// What one successful session did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncReport {
    pub clock_set: bool,
    /// Outbox entries the hub acknowledged.
    pub delivered: u8,
    /// Characteristics read and stored, clock included.
    pub fields_read: u8,
    /// Characteristics that were missing, short or failed.
    pub fields_skipped: u8,
    pub garbage_read: bool,
}

pub struct SyncSession<'a, C: Clock, E: EventSink> {
    store: &'a SharedStore,
    clock: &'a C,
    events: &'a E,
}

impl<'a, C: Clock, E: EventSink> SyncSession<'a, C, E> {
    pub fn new(store: &'a SharedStore, clock: &'a C, events: &'a E) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// Connect and sync once, then post the outcome event.
    pub async fn run<L: Link>(&self, link: &mut L) -> Result<SyncReport, BleError> {
        let started = Instant::now();
        info!("Sync: connecting");

        let result = match link.connect().await {
            Ok(mut client) => {
                info!("Sync: connected after {} ms", started.elapsed().as_millis());
                Ok(self.sync(&mut client).await)
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(report) => {
                info!(
                    "Sync: finished in {} ms ({} read, {} skipped, {} delivered)",
                    started.elapsed().as_millis(),
                    report.fields_read,
                    report.fields_skipped,
                    report.delivered
                );
                self.events.post(Event::ConnectionFinished).await;
            }
            Err(e) => {
                warn!("Sync: failed after {} ms: {:?}", started.elapsed().as_millis(), e);
                self.events.post(Event::ConnectionFailed).await;
            }
        }
        result
    }

    /// Connect and flush the outbox only. Returns without connecting when
    /// nothing is pending; writes stay queued when the hub is out of reach.
    pub async fn deliver<L: Link>(&self, link: &mut L) -> Result<u8, BleError> {
        if self.store.lock().await.outbox().pending().is_empty() {
            debug!("Deliver: outbox empty");
            return Ok(0);
        }
        let mut client = link.connect().await?;
        let mut report = SyncReport::default();
        self.flush_outbox(&mut client, &mut report).await;
        info!("Deliver: {} acknowledged", report.delivered);
        Ok(report.delivered)
    }

    /// Everything after the service is open. Never fails as a whole.
    pub async fn sync<G: GattClient>(&self, gatt: &mut G) -> SyncReport {
        let mut report = SyncReport::default();

        self.sync_clock(gatt, &mut report).await;
        self.flush_outbox(gatt, &mut report).await;
        self.sync_climate(gatt, &mut report).await;
        self.sync_windows(gatt, &mut report).await;
        self.sync_garbage(gatt, &mut report).await;
        self.sync_transit(gatt, &mut report).await;

        report
    }

    async fn sync_clock<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        let Some(raw) = read_value::<_, { codec::CLOCK_LEN }>(gatt, Characteristic::Clock, report).await
        else {
            return;
        };
        match codec::decode_clock(&raw) {
            Some(time) => {
                self.clock.set(time);
                report.clock_set = true;
                report.fields_read += 1;
                debug!("Sync: clock {:?}", time);
                self.events.post(Event::TimeUpdate).await;
            }
            None => {
                warn!("Sync: clock value out of range");
                report.fields_skipped += 1;
            }
        }
    }

    async fn flush_outbox<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        let pending = self.store.lock().await.outbox().pending();

        for write in pending {
            let payload = write.encode();
            match gatt.write(write.characteristic(), &payload).await {
                Ok(()) => {
                    if self.store.lock().await.confirm(write) {
                        info!("Sync: delivered {:?}", write);
                        report.delivered += 1;
                        self.events.post(Event::DataSent).await;
                    }
                }
                Err(e) => warn!("Sync: write {:?} failed: {:?}", write, e),
            }
        }
    }

    async fn sync_climate<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        if let Some(raw) = read_value(gatt, Characteristic::Temperature, report).await {
            let t = codec::decode_temperature(&raw);
            self.store.lock().await.update(|d| d.temperature = Some(t));
            self.events.post(Event::Temperature).await;
        }
        if let Some(raw) = read_value(gatt, Characteristic::Humidity, report).await {
            let h = codec::decode_humidity(&raw);
            self.store.lock().await.update(|d| d.humidity = Some(h));
            self.events.post(Event::Humidity).await;
        }
        if let Some(raw) = read_value(gatt, Characteristic::OutdoorTemperature, report).await {
            let t = codec::decode_temperature(&raw);
            self.store
                .lock()
                .await
                .update(|d| d.outdoor_temperature = Some(t));
            self.events.post(Event::Temperature).await;
        }
        if let Some(raw) = read_value(gatt, Characteristic::OutdoorHumidity, report).await {
            let h = codec::decode_humidity(&raw);
            self.store.lock().await.update(|d| d.outdoor_humidity = Some(h));
            self.events.post(Event::Humidity).await;
        }
    }

    async fn sync_windows<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        if let Some(raw) = read_value(gatt, Characteristic::Windows, report).await {
            let windows = codec::decode_windows(&raw);
            self.store.lock().await.update(|d| d.windows = windows);
            self.events.post(Event::Window).await;
        }
    }

    /// The hub recomputes the garbage record once a day, so it is only
    /// read in the midnight hour or while nothing was ever read.
    async fn sync_garbage<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        let unsynced = !self.store.lock().await.device().garbage.is_synced();
        let midnight = self.clock.now().map_or(true, |t| t.hour == 0);
        if !(unsynced || midnight) {
            debug!("Sync: garbage record is current");
            return;
        }
        if let Some(raw) = read_value(gatt, Characteristic::Garbage, report).await {
            let garbage = codec::decode_garbage(&raw);
            self.store.lock().await.update(|d| d.garbage = garbage);
            report.garbage_read = true;
        }
    }

    async fn sync_transit<G: GattClient>(&self, gatt: &mut G, report: &mut SyncReport) {
        if let Some(raw) = read_value(gatt, Characteristic::Transit, report).await {
            let departures = codec::decode_transit(&raw);
            self.store.lock().await.update(|d| d.departures = departures);
        }
    }
}

/// Read exactly `N` leading bytes of a characteristic.
///
/// Failures are counted and logged, never propagated.
async fn read_value<G: GattClient, const N: usize>(
    gatt: &mut G,
    characteristic: Characteristic,
    report: &mut SyncReport,
) -> Option<[u8; N]> {
    let mut buf = [0u8; BLE_MAX_VALUE_LEN];
    let result = match gatt.read(characteristic, &mut buf).await {
        Ok(len) if len < N => Err(CharError::Short),
        Ok(_) => Ok(()),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            let mut value = [0u8; N];
            value.copy_from_slice(&buf[..N]);
            if characteristic != Characteristic::Clock {
                report.fields_read += 1;
            }
            Some(value)
        }
        Err(e) => {
            warn!("Sync: skipping {:?}: {:?}", characteristic, e);
            report.fields_skipped += 1;
            None
        }
    }
}
