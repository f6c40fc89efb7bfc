//! Retained state in internal flash.
//!
//! The snapshot (`state::Retained`) is kept as a single item in a
//! `sequential-storage` key-value map over a few reserved flash pages,
//! which takes care of wear levelling and garbage collection. It is
//! loaded once at boot and written before every sleep, but only when
//! the store changed since the last write.

use core::ops::Range;

use defmt::Debug2Format;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use crate::clock::Clock;
use crate::config::{RETAINED_MAX_SIZE, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::fmt::{debug, error, info};
use crate::state::{Retained, SharedStore};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

const KEY_RETAINED: u8 = 0x01;

/// Scratch space for one map item (key, length header, snapshot).
const ITEM_BUF_SIZE: usize = 2 * RETAINED_MAX_SIZE;

fn flash_range() -> Range<u32> {
    STORAGE_START..STORAGE_END
}

/// Restore the store and the clock from flash.
///
/// Missing or undecodable data leaves the defaults in place.
pub async fn load(flash: &mut impl NorFlash, store: &SharedStore, clock: &impl Clock) {
    let mut buf = [0u8; ITEM_BUF_SIZE];

    let retained = match map::fetch_item::<u8, &[u8], _>(
        flash,
        flash_range(),
        &mut NoCache::new(),
        &mut buf,
        &KEY_RETAINED,
    )
    .await
    {
        Ok(Some(data)) => match Retained::decode(data) {
            Ok(retained) => {
                info!("Retained state loaded ({} bytes)", data.len());
                retained
            }
            Err(e) => {
                error!("Retained state discarded: {:?}", e);
                Retained::default()
            }
        },
        Ok(None) => {
            info!("No retained state in flash");
            Retained::default()
        }
        Err(e) => {
            error!("Flash read error: {:?}", Debug2Format(&e));
            Retained::default()
        }
    };

    if let Some(time) = retained.clock {
        clock.set(time);
    }
    store.lock().await.restore(retained);
}

/// Persist the store if it changed since the last load or save.
pub async fn save(flash: &mut impl NorFlash, store: &SharedStore, clock: &impl Clock) {
    let mut data = [0u8; RETAINED_MAX_SIZE];

    let len = {
        let store = store.lock().await;
        if !store.is_dirty() {
            debug!("Retained state unchanged");
            return;
        }
        match store.retained(clock.now()).encode(&mut data) {
            Ok(len) => len,
            Err(e) => {
                error!("Retained state encode failed: {:?}", e);
                return;
            }
        }
    };

    let mut buf = [0u8; ITEM_BUF_SIZE];
    let item = &data[..len];
    match map::store_item::<u8, &[u8], _>(
        flash,
        flash_range(),
        &mut NoCache::new(),
        &mut buf,
        &KEY_RETAINED,
        &item,
    )
    .await
    {
        Ok(()) => {
            info!("Retained state saved ({} bytes)", len);
            store.lock().await.mark_clean();
        }
        Err(e) => {
            error!("Flash write error: {:?}", Debug2Format(&e));
        }
    }
}
