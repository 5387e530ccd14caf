use crate::workbook::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use serde::Serialize;
use std::fmt::Display;

/// Largest serial Excel accepts (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Epoch used to interpret numeric date serials.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSystem {
    /// Serial 1 is 1900-01-01, including the Lotus 1-2-3 phantom 1900-02-29
    #[default]
    Excel1900,
    /// Serial 0 is 1904-01-01 (legacy Mac workbooks)
    Excel1904,
}

impl DateSystem {
    /// Converts a serial day number (fraction = time of day) to a timestamp.
    pub fn serial_to_datetime(&self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 || serial > MAX_SERIAL {
            return None;
        }
        let days = serial.trunc() as i64;
        let offset = match self {
            // Serials before the phantom leap day are one day behind
            Self::Excel1900 if days < 60 => 1,
            Self::Excel1900 => 0,
            Self::Excel1904 => 1_462,
        };
        let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        let date = base.checked_add_signed(Duration::days(days + offset))?;
        let seconds = (serial.fract() * 86_400.0).round() as u32;
        let time = if seconds >= 86_400 {
            NaiveTime::from_hms_opt(23, 59, 59)?
        } else {
            NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?
        };
        Some(date.and_time(time))
    }
}

/// Raw cell kinds as declared by the container, before any schema is applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    /// Boolean stored as "1" / "0"
    Boolean,
    /// Plain number
    Number,
    /// Number whose style is a date format
    NumberDate,
    /// Number whose style is a date-and-time format
    NumberDateTime,
    /// Number whose style is a time-only format
    NumberTime,
    /// ISO 8601 date or date-time text (XLSX `t="d"`, ODS dates)
    IsoDateTime,
    /// ISO 8601 duration (ODS times)
    IsoDuration,
    /// Shared, inline or formula string
    Text,
    /// Spreadsheet error value such as `#DIV/0!`
    Error,
}

impl CellType {
    /// Built-in SpreadsheetML number format ids that denote dates or times.
    pub(crate) fn from_builtin_number_format_id(id: &str) -> Option<Self> {
        match id {
            "14" | "15" | "16" | "17" => Some(Self::NumberDate),
            "22" => Some(Self::NumberDateTime),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::NumberTime),
            _ => None,
        }
    }

    /// Classifies a custom number format code by the date/time tokens it uses
    /// outside quoted literals, escapes and bracketed sections.
    pub(crate) fn from_custom_number_format(format: &str) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_bracket = false;
        let mut is_date = false;
        let mut is_time = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_literal => is_escaped = true,
                '"' => is_literal = !is_literal,
                _ if is_literal => (),
                '[' => is_bracket = true,
                ']' => is_bracket = false,
                _ if is_bracket => (),
                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::NumberDateTime,
            (true, false) => Self::NumberDate,
            (false, true) => Self::NumberTime,
            (false, false) => Self::Number,
        }
    }

    /// Whether the cell holds a numeric serial.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::NumberDate | Self::NumberDateTime | Self::NumberTime)
    }

    /// Whether the container already marked the cell as a date or time.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::NumberDate | Self::NumberDateTime | Self::NumberTime | Self::IsoDateTime | Self::IsoDuration
        )
    }
}

/// One populated cell of a worksheet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawCell {
    /// Row index (0-based)
    pub row: usize,
    /// Column index (0-based)
    pub col: usize,
    pub kind: CellType,
    /// Value exactly as stored in the container
    pub value: String,
}

impl RawCell {
    /// A1-style reference, e.g. "C7".
    pub fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    /// Numeric payload of number-like cells.
    pub fn as_f64(&self) -> Option<f64> {
        if self.kind.is_numeric() {
            self.value.trim().parse::<f64>().ok().filter(|value| value.is_finite())
        } else {
            None
        }
    }

    /// Boolean payload of boolean cells.
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            CellType::Boolean => Some(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    /// Timestamp for cells the container marked as dates or times.
    pub fn as_datetime(&self, system: DateSystem) -> Option<NaiveDateTime> {
        match self.kind {
            CellType::NumberDate | CellType::NumberDateTime | CellType::NumberTime => {
                self.as_f64().and_then(|serial| system.serial_to_datetime(serial))
            }
            CellType::IsoDateTime => parse_iso_datetime(&self.value),
            _ => None,
        }
    }

    /// Text rendering used for headers and text columns.
    pub fn to_text(&self, system: DateSystem) -> String {
        match self.kind {
            CellType::Boolean => if self.as_bool() == Some(true) { "TRUE" } else { "FALSE" }.to_owned(),
            CellType::Number => self.as_f64().map(format_number).unwrap_or_else(|| self.value.to_owned()),
            CellType::NumberDate => self
                .as_datetime(system)
                .map(|datetime| datetime.date().to_string())
                .unwrap_or_else(|| self.value.to_owned()),
            CellType::NumberDateTime | CellType::IsoDateTime => self
                .as_datetime(system)
                .map(|datetime| {
                    if datetime.time() == NaiveTime::MIN {
                        datetime.date().to_string()
                    } else {
                        datetime.to_string()
                    }
                })
                .unwrap_or_else(|| self.value.to_owned()),
            CellType::NumberTime => self
                .as_datetime(system)
                .map(|datetime| datetime.time().to_string())
                .unwrap_or_else(|| self.value.to_owned()),
            CellType::IsoDuration => match self.value.parse::<IsoDuration>() {
                Ok(duration) => format!(
                    "{:02}:{:02}:{:02}",
                    duration.hour as u32,
                    duration.minute as u32,
                    duration.second.round() as u32
                ),
                Err(_) => self.value.to_owned(),
            },
            CellType::Text | CellType::Error => self.value.to_owned(),
        }
    }
}

impl Display for RawCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text(DateSystem::default()))
    }
}

/// Renders integral floats without a fractional part ("3" rather than "3.0").
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Parses `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS[.fff]`, ignoring a trailing zone.
pub(crate) fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
            .ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> RawCell {
        RawCell { row: 0, col: 0, kind, value: value.to_owned() }
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn serials_in_1900_system() {
        let system = DateSystem::Excel1900;
        assert_eq!(system.serial_to_datetime(1.0).unwrap().date(), ymd(1900, 1, 1));
        assert_eq!(system.serial_to_datetime(59.0).unwrap().date(), ymd(1900, 2, 28));
        assert_eq!(system.serial_to_datetime(61.0).unwrap().date(), ymd(1900, 3, 1));
        assert_eq!(system.serial_to_datetime(45306.0).unwrap().date(), ymd(2024, 1, 15));
        assert!(system.serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn serials_in_1904_system() {
        let system = DateSystem::Excel1904;
        assert_eq!(system.serial_to_datetime(0.0).unwrap().date(), ymd(1904, 1, 1));
        assert_eq!(system.serial_to_datetime(43844.0).unwrap().date(), ymd(2024, 1, 15));
    }

    #[test]
    fn serial_time_of_day() {
        let datetime = DateSystem::Excel1900.serial_to_datetime(45306.75).unwrap();
        assert_eq!(datetime.time(), NaiveTime::from_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn custom_number_formats() {
        assert_eq!(CellType::from_custom_number_format("yyyy-mm-dd"), CellType::NumberDate);
        assert_eq!(CellType::from_custom_number_format("dd/mm/yyyy hh:mm"), CellType::NumberDateTime);
        assert_eq!(CellType::from_custom_number_format("[h]:mm:ss"), CellType::NumberTime);
        assert_eq!(CellType::from_custom_number_format("\"$\"#,##0.00"), CellType::Number);
        assert_eq!(CellType::from_custom_number_format("[Red]0.00%"), CellType::Number);
        assert_eq!(CellType::from_custom_number_format("0.0\"days\""), CellType::Number);
    }

    #[test]
    fn text_rendering() {
        let system = DateSystem::Excel1900;
        assert_eq!(cell(CellType::Number, "3").to_text(system), "3");
        assert_eq!(cell(CellType::Number, "3.0").to_text(system), "3");
        assert_eq!(cell(CellType::Number, "2.5").to_text(system), "2.5");
        assert_eq!(cell(CellType::Boolean, "1").to_text(system), "TRUE");
        assert_eq!(cell(CellType::NumberDate, "45306").to_text(system), "2024-01-15");
        assert_eq!(cell(CellType::IsoDateTime, "2024-01-15T00:00:00").to_text(system), "2024-01-15");
        assert_eq!(cell(CellType::IsoDuration, "PT13H30M00S").to_text(system), "13:30:00");
    }

    #[test]
    fn numeric_payload_only_for_numbers() {
        assert_eq!(cell(CellType::Number, " 12.5 ").as_f64(), Some(12.5));
        assert_eq!(cell(CellType::Text, "12.5").as_f64(), None);
        assert_eq!(cell(CellType::Number, "NaN").as_f64(), None);
    }
}
