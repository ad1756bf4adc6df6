//! Configuration file support.
//!
//! Settings live in an INI file at `<config_dir>/missiontracker/config.ini`.
//! Every key is optional; missing keys keep their defaults.
//!
//! ```ini
//! [publisher]
//! min_interval_ms = 3000
//! mode = team
//! document = missiondata/locations
//! field = team
//!
//! [offline]
//! enabled = true
//! style_url = mapbox://styles/mapbox/satellite-v9
//! min_zoom = 0
//! max_zoom = 18
//! pixel_ratio = 1
//! retry_delay_secs = 30
//!
//! [logging]
//! level = info
//! ```

mod file;

pub use file::{config_file_path, ConfigError, ConfigFile};
