use tracing::warn;

use crate::config::parse_clock;
use crate::domain::types::{AddressCorrection, Deadline, PackageId, SpecialNote};
use crate::error::{DispatchError, Result};

pub fn parse_deadline(raw: &str) -> Result<Deadline> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("eod") {
        return Ok(Deadline::EndOfDay);
    }
    parse_clock(raw)
        .map(Deadline::By)
        .ok_or_else(|| DispatchError::Dataset(format!("unreadable deadline '{raw}'")))
}

/// Normalizes free-text package notes into one of the four note kinds.
///
/// A "wrong address" note takes its time from the scheduled correction for the
/// same package, so one must exist.
pub fn parse_note(
    package: PackageId,
    raw: &str,
    correction: Option<&AddressCorrection>,
) -> Result<Option<SpecialNote>> {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return Ok(None);
    }

    if text.contains("only be on truck") {
        let truck = trailing_number(&text)
            .ok_or_else(|| bad_note(package, raw))?;
        return Ok(Some(SpecialNote::OnTruck(truck)));
    }

    if let Some((_, rest)) = text.split_once("delivered with") {
        let ids = rest
            .split(',')
            .map(|s| s.trim().parse::<PackageId>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| bad_note(package, raw))?;
        return Ok(Some(SpecialNote::DeliverWith(ids)));
    }

    if text.contains("wrong address") {
        return match correction {
            Some(c) if c.package == package => Ok(Some(SpecialNote::WrongAddressUntil(c.at))),
            _ => Err(DispatchError::Dataset(format!(
                "package {package} has a wrong address but no scheduled correction"
            ))),
        };
    }

    if let Some((_, rest)) = text.rsplit_once("until") {
        let at = parse_clock(rest).ok_or_else(|| bad_note(package, raw))?;
        return Ok(Some(SpecialNote::AvailableAfter(at)));
    }

    warn!("Ignoring unrecognized note on package {package}: '{raw}'");
    Ok(None)
}

fn trailing_number(text: &str) -> Option<u32> {
    text.split_whitespace().last()?.parse().ok()
}

fn bad_note(package: PackageId, raw: &str) -> DispatchError {
    DispatchError::Dataset(format!("package {package} has an unreadable note '{raw}'"))
}
