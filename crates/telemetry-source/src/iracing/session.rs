//! The subset of iRacing's session YAML the relay reads.

use serde::Deserialize;

use crate::record::SessionInfo;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionDocument {
    driver_info: Option<DriverInfoSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DriverInfoSection {
    driver_car_red_line: Option<f32>,
    drivers: Option<Vec<serde_yaml::Value>>,
}

/// Extract redline and roster size from a session string.
///
/// Unknown keys are ignored; a document without `DriverInfo` parses to an
/// empty [`SessionInfo`].
pub fn parse_session_info(yaml: &str) -> Result<SessionInfo, serde_yaml::Error> {
    if yaml.trim().is_empty() {
        return Ok(SessionInfo::default());
    }
    let document: Option<SessionDocument> = serde_yaml::from_str(yaml)?;
    let driver_info = document.and_then(|doc| doc.driver_info).unwrap_or_default();
    Ok(SessionInfo {
        red_line_rpm: driver_info
            .driver_car_red_line
            .filter(|rpm| rpm.is_finite() && *rpm > 0.0),
        roster_size: driver_info.drivers.map(|drivers| drivers.len()),
    })
}
