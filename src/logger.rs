//! Logging bootstrap for the binaries.
//!
//! Lines look like `[  12.345s  INFO board_align::relay] message`. The
//! filter comes from `RUST_LOG` and defaults to `info`.

use log::LevelFilter;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

static STARTED: OnceLock<Instant> = OnceLock::new();

fn builder(default_level: LevelFilter) -> env_logger::Builder {
    let started = *STARTED.get_or_init(Instant::now);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(default_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "[{:8.3}s {:>5} {}] {}",
            started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
}

/// Install the logger; `RUST_LOG` overrides `default_level`. Later calls
/// are no-ops.
pub fn init_with_level(default_level: LevelFilter) {
    let _ = builder(default_level).try_init();
}

pub fn init() {
    init_with_level(LevelFilter::Info);
}
