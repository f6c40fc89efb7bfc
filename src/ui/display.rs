//! Frame layout on a 128×64 monochrome panel.
//!
//! ```text
//!  y  0  headline ............ HH:MM
//!  y  8  ───────────────────────────
//!  y 10  body row 0
//!   ...  (7 px per row)
//!  y 45  body row 5
//!  y 54  ───────────────────────────
//!  y 56  key0    key1    key2    key3
//! ```
//!
//! `draw_frame` works on any `DrawTarget`, so the layout is tested on
//! the host against a plain framebuffer. The SSD1306 wrapper is only
//! built for the device.

use embedded_graphics::mono_font::ascii::FONT_5X7;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line as Rule, PrimitiveStyle};
use embedded_graphics::text::{Baseline, Text};

use crate::config::SOFTKEY_COUNT;
use crate::ui::Frame;

pub const WIDTH: i32 = 128;
pub const HEIGHT: i32 = 64;

const GLYPH_WIDTH: i32 = 5;
const ROW_HEIGHT: i32 = 7;
const HEADLINE_RULE_Y: i32 = 8;
const BODY_TOP: i32 = 10;
const SOFTKEY_RULE_Y: i32 = 54;
const SOFTKEY_TOP: i32 = 56;
const SOFTKEY_COLUMN: i32 = WIDTH / SOFTKEY_COUNT as i32;

fn text_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_5X7)
        .text_color(BinaryColor::On)
        .build()
}

fn text<D>(target: &mut D, s: &str, x: i32, y: i32) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Text::with_baseline(s, Point::new(x, y), text_style(), Baseline::Top).draw(target)?;
    Ok(())
}

fn rule<D>(target: &mut D, y: i32) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Rule::new(Point::new(0, y), Point::new(WIDTH - 1, y))
        .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
        .draw(target)
}

/// Clear `target` and draw `frame`.
pub fn draw_frame<D>(target: &mut D, frame: &Frame) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;

    text(target, frame.headline.as_str(), 0, 0)?;
    if !frame.headline_right.is_empty() {
        let x = WIDTH - frame.headline_right.len() as i32 * GLYPH_WIDTH;
        text(target, frame.headline_right.as_str(), x, 0)?;
    }
    rule(target, HEADLINE_RULE_Y)?;

    for (row, line) in frame.body.iter().enumerate() {
        text(target, line.as_str(), 0, BODY_TOP + row as i32 * ROW_HEIGHT)?;
    }

    rule(target, SOFTKEY_RULE_Y)?;
    for (slot, icon) in frame.softkeys.iter().enumerate() {
        if let Some(icon) = icon {
            let label = icon.label();
            // Centre the label in its column.
            let x = slot as i32 * SOFTKEY_COLUMN
                + (SOFTKEY_COLUMN - label.len() as i32 * GLYPH_WIDTH) / 2;
            text(target, label, x, SOFTKEY_TOP)?;
        }
    }
    Ok(())
}

#[cfg(feature = "embedded")]
pub use oled::OledDisplay;

#[cfg(feature = "embedded")]
mod oled {
    use ssd1306::mode::BufferedGraphicsMode;
    use ssd1306::prelude::*;
    use ssd1306::I2CDisplayInterface;
    use ssd1306::Ssd1306;

    use super::draw_frame;
    use crate::error::Error;
    use crate::fmt::warn;
    use crate::ui::{Display, Frame};

    type Driver<I2C> =
        Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

    /// SSD1306 128×64 OLED on I²C, buffered graphics mode.
    pub struct OledDisplay<I2C> {
        driver: Driver<I2C>,
    }

    impl<I2C> OledDisplay<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        /// Initialise the panel and clear it.
        pub fn new(i2c: I2C) -> Self {
            let interface = I2CDisplayInterface::new(i2c);
            let mut driver = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            if driver.init().is_err() {
                warn!("OLED init failed");
            }
            driver.clear_buffer();
            let _ = driver.flush();
            Self { driver }
        }
    }

    impl<I2C> Display for OledDisplay<I2C>
    where
        I2C: embedded_hal::i2c::I2c,
    {
        fn show(&mut self, frame: &Frame) -> Result<(), Error> {
            self.driver.clear_buffer();
            draw_frame(&mut self.driver, frame).map_err(|_| Error::Display)?;
            self.driver.flush().map_err(|_| Error::Display)
        }
    }
}
