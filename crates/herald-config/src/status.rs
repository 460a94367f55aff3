use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which status changes are broadcast to subscribers.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusNotifications {
    /// Only a change of status code triggers a notification.
    #[default]
    Code,
    /// Any change of code, message or details triggers a notification.
    Any,
}
