//! Guest-facing message texts

use shared::waitlist::WaitlistStatus;

pub const DEFAULT_RESTAURANT_NAME: &str = "our restaurant";

/// Renders messages for one restaurant
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    restaurant: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new(DEFAULT_RESTAURANT_NAME)
    }
}

impl MessageTemplates {
    pub fn new(restaurant: impl Into<String>) -> Self {
        Self {
            restaurant: restaurant.into(),
        }
    }

    pub fn restaurant(&self) -> &str {
        &self.restaurant
    }

    pub fn table_ready(&self, guest: &str) -> String {
        format!(
            "Hi {guest}! Your table at {} is ready. Please check in with the host.",
            self.restaurant
        )
    }

    pub fn reminder(&self, guest: &str, minutes: u32) -> String {
        format!(
            "Hi {guest}! Reminder: Your table at {} should be ready in about {minutes} minutes. Please stay nearby!",
            self.restaurant
        )
    }

    pub fn status_update(&self, guest: &str, status: WaitlistStatus) -> String {
        let restaurant = &self.restaurant;
        match status {
            WaitlistStatus::Waiting => {
                format!("Hi {guest}! You're on the waitlist at {restaurant}.")
            }
            WaitlistStatus::Seated => {
                format!("Hi {guest}! You've been seated at {restaurant}. Enjoy your meal!")
            }
            WaitlistStatus::Canceled => {
                format!("Hi {guest}, your spot on the {restaurant} waitlist has been canceled.")
            }
            WaitlistStatus::NoShow => format!(
                "Hi {guest}, we missed you at {restaurant}. Your spot on the waitlist has been released."
            ),
        }
    }
}
