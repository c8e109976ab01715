//! Device domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::event::EntityId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Available,
    Assigned,
    Maintenance,
    Retired,
    Sold,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
            Self::Maintenance => "maintenance",
            Self::Retired => "retired",
            Self::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "assigned" => Some(Self::Assigned),
            "maintenance" => Some(Self::Maintenance),
            "retired" => Some(Self::Retired),
            "sold" => Some(Self::Sold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Laptop,
    Monitor,
    Keyboard,
    Mouse,
    Stand,
    Backpack,
    Mobile,
    Charger,
    Chip,
    KeyboardMouseKit,
    Headphones,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Laptop => "laptop",
            Self::Monitor => "monitor",
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
            Self::Stand => "stand",
            Self::Backpack => "backpack",
            Self::Mobile => "mobile",
            Self::Charger => "charger",
            Self::Chip => "chip",
            Self::KeyboardMouseKit => "keyboard_mouse_kit",
            Self::Headphones => "headphones",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "laptop" => Some(Self::Laptop),
            "monitor" => Some(Self::Monitor),
            "keyboard" => Some(Self::Keyboard),
            "mouse" => Some(Self::Mouse),
            "stand" => Some(Self::Stand),
            "backpack" => Some(Self::Backpack),
            "mobile" => Some(Self::Mobile),
            "charger" => Some(Self::Charger),
            "chip" => Some(Self::Chip),
            "keyboard_mouse_kit" => Some(Self::KeyboardMouseKit),
            "headphones" => Some(Self::Headphones),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    pub id: EntityId,
    pub serial_number: String,
    pub device_type: DeviceType,
    pub brand: String,
    pub model: String,
    pub hostname: Option<String>,
    /// Asset tag, e.g. `INV-MON-001`.
    pub inventory_code: Option<String>,
    pub location: Option<String>,
    pub status: DeviceStatus,
    pub purchase_date: Option<NaiveDate>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDevice {
    pub serial_number: String,
    pub device_type: DeviceType,
    pub brand: String,
    pub model: String,
    pub hostname: Option<String>,
    pub inventory_code: Option<String>,
    pub location: Option<String>,
    pub purchase_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDevice {
    pub serial_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub hostname: Option<Option<String>>,
    pub inventory_code: Option<Option<String>>,
    pub location: Option<Option<String>>,
    /// Assignment-driven statuses are rejected; use assign/return instead.
    pub status: Option<DeviceStatus>,
}
