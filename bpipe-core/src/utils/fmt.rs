use std::fmt::{Display, Write};

pub const MAX_DISPLAY_BYTES: usize = 16;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Hex dump of a byte slice, truncated after `MAX_DISPLAY_BYTES` by default.
#[derive(Debug)]
pub struct ToHex<'a>(pub &'a [u8]);

impl ToHex<'_> {
    pub fn print_n(&self, f: &mut dyn Write, n: usize) -> std::fmt::Result {
        for (i, x) in self.0.iter().enumerate() {
            if i >= n {
                return write!(f, "... {} bytes omitted", self.0.len() - i);
            }

            write!(f, "{:02X?}", x)?;

            if i < self.0.len() - 1 {
                f.write_str(" ")?;
            }
        }

        Ok(())
    }
}

impl Display for ToHex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.print_n(f, MAX_DISPLAY_BYTES)
    }
}

/// Render a byte count with a binary unit, e.g. `1.50 KB`.
pub fn format_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;

    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", size, SIZE_UNITS[0])
    } else {
        format!("{:.2} {}", value, SIZE_UNITS[unit])
    }
}
