use serde::{Deserialize, Serialize};

macro_rules! bin_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn parse(raw: &str) -> Option<Self> {
                match raw {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

bin_enum!(CountBin {
    Zero => "0",
    OneToFive => "1-5",
    SixToTwenty => "6-20",
    TwentyPlus => "20+",
});

bin_enum!(InterviewBin {
    Zero => "0",
    OneToTwo => "1-2",
    ThreeToFive => "3-5",
    FivePlus => "5+",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    TooExpensive,
    PlatformNotHelpful,
    NotEnoughJobs,
    DecidedNotToMove,
    Other,
}

impl CancellationReason {
    pub const ALL: &'static [CancellationReason] = &[
        Self::TooExpensive,
        Self::PlatformNotHelpful,
        Self::NotEnoughJobs,
        Self::DecidedNotToMove,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooExpensive => "too_expensive",
            Self::PlatformNotHelpful => "platform_not_helpful",
            Self::NotEnoughJobs => "not_enough_jobs",
            Self::DecidedNotToMove => "decided_not_to_move",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|reason| reason.as_str() == raw)
    }

    /// `too_expensive` carries a price ceiling; every other reason carries free-text details.
    pub fn expects_price(self) -> bool {
        self == Self::TooExpensive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaSource {
    WithPlatform,
    NoPlatform,
}

impl VisaSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithPlatform => "with_platform",
            Self::NoPlatform => "no_platform",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "with_platform" => Some(Self::WithPlatform),
            "no_platform" => Some(Self::NoPlatform),
            _ => None,
        }
    }
}

impl From<YesNo> for VisaSource {
    fn from(found_via_platform: YesNo) -> Self {
        match found_via_platform {
            YesNo::Yes => Self::WithPlatform,
            YesNo::No => Self::NoPlatform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbVariant {
    A,
    B,
}

impl AbVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            _ => None,
        }
    }
}
