//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                          |
//! |-------------|--------------|--------------------------------------|
//! | `gpio`      | GpioLine     | `/sys/class/gpio/gpioN`              |
//! |             | EdgeWatch    | polled `value` attribute             |
//! | `led`       | LedChannel   | `/sys/class/leds/<name>`             |
//! | `pwm`       | PwmChannel   | `/sys/class/pwm/pwmchipN/pwmM`       |
//! | `dummy`     | all of above | in-memory simulation, test benches   |
//! | `log_sink`  | EventSink    | `log` facade                         |
//! | `time`      | Clock        | system clock / fixed test clock      |
//! | `audio`     |              | `aplay` child process                |
//! | `registry`  |              | single-owner claim on device paths   |

pub mod audio;
pub mod dummy;
pub mod gpio;
pub mod led;
pub mod log_sink;
pub mod pwm;
pub mod registry;
pub mod time;
pub(crate) mod utils;
