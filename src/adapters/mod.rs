//! Adapters — concrete implementations of the port traits.
//!
//! | Adapter    | Implements            | Connects to                |
//! |------------|-----------------------|----------------------------|
//! | `log_sink` | EventSink             | `log` facade               |
//! | `sim`      | GattTransport         | In-memory BluFi device     |
//! |            | NotificationSource    |                            |
//! | `time`     | Delay                 | async-io-mini timer        |

pub mod log_sink;
pub mod sim;
pub mod time;
