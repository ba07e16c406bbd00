//! Message bus adapters.

pub mod mqtt;

pub use mqtt::{connect, MqttInbound, MqttSettings, MqttTransport};
