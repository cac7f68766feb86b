use serde::{Deserialize, Serialize};

/// What happened to a booking. Actions this build does not know about
/// decode as `Unknown` so the rest of the update still gets through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingAction {
    Confirmed,
    CheckIn,
    Completed,
    Cancelled,
    StaffReassigned,
    ServiceAdded,
    #[serde(other)]
    Unknown,
}

/// Payload of a `BOOKING_UPDATE` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingUpdate {
    pub booking_id: String,
    pub booking_code: String,
    pub action: BookingAction,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_staff_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_staff_id: Option<String>,
}

impl BookingUpdate {
    /// True when the update moved the booking to a different staff member.
    pub fn is_reassignment(&self) -> bool {
        self.action == BookingAction::StaffReassigned && self.old_staff_id != self.new_staff_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_staff_reassignment() {
        let update: BookingUpdate = serde_json::from_value(json!({
            "bookingId": "b-1",
            "bookingCode": "BK-0001",
            "action": "STAFF_REASSIGNED",
            "status": "CONFIRMED",
            "oldStaffId": "v-1",
            "newStaffId": "v-2"
        }))
        .unwrap();

        assert_eq!(update.action, BookingAction::StaffReassigned);
        assert!(update.is_reassignment());
    }

    #[test]
    fn test_deserialize_check_in_without_staff() {
        let update: BookingUpdate = serde_json::from_value(json!({
            "bookingId": "b-2",
            "bookingCode": "BK-0002",
            "action": "CHECK_IN",
            "status": "IN_PROGRESS"
        }))
        .unwrap();

        assert_eq!(update.action, BookingAction::CheckIn);
        assert!(update.old_staff_id.is_none());
        assert!(!update.is_reassignment());
    }

    #[test]
    fn test_unrecognized_action_falls_back_to_unknown() {
        let update: BookingUpdate = serde_json::from_value(json!({
            "bookingId": "b-3",
            "bookingCode": "BK-0003",
            "action": "RESCHEDULED",
            "status": "CONFIRMED"
        }))
        .unwrap();

        assert_eq!(update.action, BookingAction::Unknown);
        assert_eq!(update.booking_code, "BK-0003");
        assert!(!update.is_reassignment());
    }

    #[test]
    fn test_missing_action_is_rejected() {
        let result = serde_json::from_value::<BookingUpdate>(json!({
            "bookingId": "b-4",
            "bookingCode": "BK-0004",
            "status": "CONFIRMED"
        }));
        assert!(result.is_err());
    }
}
