//! Retention-offer A/B assignment.
//!
//! The variant lives in the `ab_offer_variant` cookie so that re-entering the offer
//! step within a session shows the same framing. Backing out of or closing the offer
//! step deletes the cookie, which makes the next entry draw again.

use std::{fmt, str::FromStr};

use rand::Rng;
use shared::{domain::AbVariant, protocol::AB_VARIANT_COOKIE_NAME};
use tracing::debug;

use crate::cookies::SessionCookies;

pub const VARIANT_B_DISCOUNT_CENTS: u32 = 1000;

/// Explicit assignment signal, e.g. from an `?ab=` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbOverride {
    Force(AbVariant),
    /// Wipe any stored variant before drawing.
    Reset,
}

impl FromStr for AbOverride {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "clear" | "reset" => Ok(Self::Reset),
            other => AbVariant::parse(other)
                .map(Self::Force)
                .ok_or_else(|| format!("unknown A/B override '{other}' (expected A, B, clear or reset)")),
        }
    }
}

impl fmt::Display for AbOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Force(variant) => f.write_str(variant.as_str()),
            Self::Reset => f.write_str("reset"),
        }
    }
}

pub fn stored_variant(cookies: &SessionCookies) -> Option<AbVariant> {
    cookies
        .get(AB_VARIANT_COOKIE_NAME)
        .as_deref()
        .and_then(AbVariant::parse)
}

pub fn assign_variant<R: Rng + ?Sized>(
    cookies: &SessionCookies,
    override_signal: Option<AbOverride>,
    rng: &mut R,
) -> AbVariant {
    match override_signal {
        Some(AbOverride::Force(variant)) => {
            cookies.set(AB_VARIANT_COOKIE_NAME, variant.as_str());
            debug!(variant = variant.as_str(), "offer variant forced by override");
            return variant;
        }
        Some(AbOverride::Reset) => clear_variant(cookies),
        None => {}
    }

    if let Some(existing) = stored_variant(cookies) {
        return existing;
    }

    let drawn = if rng.gen_bool(0.5) {
        AbVariant::A
    } else {
        AbVariant::B
    };
    cookies.set(AB_VARIANT_COOKIE_NAME, drawn.as_str());
    debug!(variant = drawn.as_str(), "offer variant drawn");
    drawn
}

pub fn clear_variant(cookies: &SessionCookies) {
    cookies.remove(AB_VARIANT_COOKIE_NAME);
}

/// A: half price (rounded half up). B: ten dollars off, floored at zero.
pub fn discounted_price_cents(variant: AbVariant, base_price_cents: u32) -> u32 {
    match variant {
        AbVariant::A => base_price_cents / 2 + base_price_cents % 2,
        AbVariant::B => base_price_cents.saturating_sub(VARIANT_B_DISCOUNT_CENTS),
    }
}

#[cfg(test)]
#[path = "tests/ab_tests.rs"]
mod tests;
