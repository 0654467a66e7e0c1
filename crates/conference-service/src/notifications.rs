//! Text bodies sent to the organizer and participants.

use common::types::PhoneNumber;

/// Sent to the organizer when the provider refuses to start a conference.
pub const START_FAILURE_TEXT: &str =
    "Sorry, the conference could not be started. Please try again in a few minutes.";

/// Sent to the organizer when a start message contains something other than phone numbers.
pub const INVALID_NUMBER_PREFIX: &str = "Conference not started: invalid phone number";

fn join_numbers(numbers: &[PhoneNumber]) -> String {
    numbers
        .iter()
        .map(PhoneNumber::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Invitation sent to every listed participant.
#[must_use]
pub fn invite_text(organizer: &PhoneNumber, system_number: &PhoneNumber) -> String {
    format!("{organizer} has invited you to a conference call. Call {system_number} to join.")
}

/// Confirmation sent to the organizer once invites went out.
#[must_use]
pub fn start_confirmation_text(invited: &[PhoneNumber]) -> String {
    format!(
        "Conference started. Invites sent to {} participant(s): {}",
        invited.len(),
        join_numbers(invited)
    )
}

/// Attendee list sent to the organizer after the conference ends.
#[must_use]
pub fn roster_text(participants: &[PhoneNumber]) -> String {
    if participants.is_empty() {
        "Conference attendees: none".to_string()
    } else {
        format!("Conference attendees: {}", join_numbers(participants))
    }
}

/// Rejection of a start message with the wrong number of participants.
#[must_use]
pub fn participant_count_error_text(count: usize, min: usize, max: usize) -> String {
    format!(
        "Conference not started: received {count} number(s), but between {min} and {max} are required."
    )
}

/// Rejection of a start message containing an unparseable number.
#[must_use]
pub fn invalid_number_text(token: &str) -> String {
    format!("{INVALID_NUMBER_PREFIX} '{token}'.")
}

/// Apology sent when the provider refuses to start a conference.
#[must_use]
pub fn start_failure_text() -> String {
    START_FAILURE_TEXT.to_string()
}

/// The organizer's closing message, forwarded verbatim.
#[must_use]
pub fn closing_text(text: &str) -> String {
    text.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn numbers(raw: &[&str]) -> Vec<PhoneNumber> {
        raw.iter().map(|n| PhoneNumber::parse(n).unwrap()).collect()
    }

    #[test]
    fn test_invite_text() {
        let organizer = PhoneNumber::parse("+19195550001").unwrap();
        let system = PhoneNumber::parse("+19195550000").unwrap();

        assert_eq!(
            invite_text(&organizer, &system),
            "+19195550001 has invited you to a conference call. Call +19195550000 to join."
        );
    }

    #[test]
    fn test_start_confirmation_lists_everyone_in_order() {
        let invited = numbers(&["+19195551111", "+19195552222"]);
        assert_eq!(
            start_confirmation_text(&invited),
            "Conference started. Invites sent to 2 participant(s): +19195551111, +19195552222"
        );
    }

    #[test]
    fn test_roster_text() {
        assert_eq!(roster_text(&[]), "Conference attendees: none");
        assert_eq!(
            roster_text(&numbers(&["+19195553333"])),
            "Conference attendees: +19195553333"
        );
    }

    #[test]
    fn test_error_texts() {
        assert_eq!(
            participant_count_error_text(21, 1, 20),
            "Conference not started: received 21 number(s), but between 1 and 20 are required."
        );
        assert_eq!(
            invalid_number_text("call-me"),
            "Conference not started: invalid phone number 'call-me'."
        );
        assert!(!start_failure_text().is_empty());
    }

    #[test]
    fn test_closing_text_is_verbatim() {
        let text = "  Thanks all!  See you next week. ";
        assert_eq!(closing_text(text), text);
    }
}
