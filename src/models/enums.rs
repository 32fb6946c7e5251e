use crate::db::StorageError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(StorageError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

// Staff is "bhw" (barangay health worker) in stored conversations.
str_enum!(MessageRole {
    Staff => "bhw",
    Patient => "patient",
    System => "system",
});

str_enum!(ReferralStatus {
    Pending => "Pending",
    Accepted => "Accepted",
    Scheduled => "Scheduled",
    Rejected => "Rejected",
});

str_enum!(AppointmentStatus {
    Pending => "Pending",
    Approved => "Approved",
    Completed => "Completed",
});

impl ReferralStatus {
    /// Badge color shown next to a referral.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Pending => "#F0A500",
            Self::Accepted => "#2E7D32",
            Self::Scheduled => "#0A6CFF",
            Self::Rejected => "#C62828",
        }
    }
}

impl AppointmentStatus {
    /// Pending → Approved → Completed → Pending.
    pub fn next(&self) -> Self {
        match self {
            Self::Pending => Self::Approved,
            Self::Approved => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Pending => "status-pending",
            Self::Approved => "status-approved",
            Self::Completed => "status-completed",
        }
    }

    /// Parse a badge label the way the dashboard markup writes it
    /// ("pending", " Approved ", ...). Unknown labels read as Pending.
    pub fn from_badge(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "approved" => Self::Approved,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn message_role_round_trip() {
        for (variant, s) in [
            (MessageRole::Staff, "bhw"),
            (MessageRole::Patient, "patient"),
            (MessageRole::System, "system"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(MessageRole::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_uses_string_form() {
        assert_eq!(serde_json::to_string(&MessageRole::Staff).unwrap(), "\"bhw\"");
        assert_eq!(
            serde_json::from_str::<ReferralStatus>("\"Scheduled\"").unwrap(),
            ReferralStatus::Scheduled
        );
    }

    #[test]
    fn referral_status_colors() {
        assert_eq!(ReferralStatus::Pending.color(), "#F0A500");
        assert_eq!(ReferralStatus::Accepted.color(), "#2E7D32");
        assert_eq!(ReferralStatus::Scheduled.color(), "#0A6CFF");
        assert_eq!(ReferralStatus::Rejected.color(), "#C62828");
    }

    #[test]
    fn appointment_status_cycles() {
        let mut status = AppointmentStatus::Pending;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(status);
            status = status.next();
        }
        assert_eq!(
            seen,
            vec![
                AppointmentStatus::Pending,
                AppointmentStatus::Approved,
                AppointmentStatus::Completed,
                AppointmentStatus::Pending,
            ]
        );
    }

    #[test]
    fn badge_labels_parse_case_insensitively() {
        assert_eq!(AppointmentStatus::from_badge(" Approved "), AppointmentStatus::Approved);
        assert_eq!(AppointmentStatus::from_badge("COMPLETED"), AppointmentStatus::Completed);
        assert_eq!(AppointmentStatus::from_badge("whatever"), AppointmentStatus::Pending);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(ReferralStatus::from_str("pending").is_err());
        assert!(MessageRole::from_str("staff").is_err());
        assert!(AppointmentStatus::from_str("").is_err());
    }

    #[test]
    fn all_lists_every_variant() {
        assert_eq!(ReferralStatus::ALL.len(), 4);
        assert_eq!(MessageRole::ALL.len(), 3);
    }
}
