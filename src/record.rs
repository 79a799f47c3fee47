//! Data structures describing one technical service report.
//!
//! The types deserialize from the camelCase JSON produced by the report form.
//! Measurements are kept as the caller typed them: the builder prints them
//! verbatim and only substitutes a placeholder when a value is missing.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::labels;

/// Formats a report number with at least four digits (`7` becomes `0007`).
///
/// Numbers wider than four digits are printed in full.
pub fn report_number_label(number: u32) -> String {
    format!("{:04}", number)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientText {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl From<LenientText> for String {
    fn from(value: LenientText) -> Self {
        match value {
            LenientText::Text(text) => text,
            LenientText::Number(number) => number.to_string(),
            LenientText::Bool(flag) => flag.to_string(),
        }
    }
}

/// A measurement entered on the form, kept as text.
///
/// JSON numbers are accepted and stringified without reformatting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Reading(Option<String>);

impl Reading {
    /// Creates a reading from the provided text.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    /// Creates a reading without a value.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Returns the trimmed value, or `None` when nothing was entered.
    pub fn value(&self) -> Option<&str> {
        self.0
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the value or the placeholder used for missing cells.
    pub fn display(&self) -> &str {
        self.value().unwrap_or(labels::PLACEHOLDER)
    }

    /// Returns the value followed by `unit`, or the bare placeholder.
    pub fn display_with_unit(&self, unit: &str) -> String {
        match self.value() {
            Some(value) => format!("{} {}", value, unit),
            None => labels::PLACEHOLDER.to_string(),
        }
    }

    /// Whether the value parses as a number (a decimal comma is accepted).
    pub fn is_numeric(&self) -> bool {
        self.value()
            .map(|value| value.replace(',', ".").parse::<f64>().is_ok())
            .unwrap_or(true)
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<LenientText>::deserialize(deserializer)?;
        Ok(Self(value.map(String::from)))
    }
}

impl From<&str> for Reading {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a photo within a report.
///
/// New identifiers are random UUIDs so that photos added in quick succession
/// never collide. Identifiers coming from older clients may be numeric.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhotoId(String);

impl PhotoId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for PhotoId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PhotoId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        LenientText::deserialize(deserializer).map(|value| Self(value.into()))
    }
}

/// Error returned when a choice field carries an unknown value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value `{value}`")]
pub struct UnknownChoice {
    field: &'static str,
    value: String,
}

fn normalized_choice(value: &str) -> String {
    value.trim().to_lowercase().replace(['_', '-'], " ")
}

/// The six service categories offered on the form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    PreventiveMaintenance,
    BatteryReplacement,
    DiagnosticReview,
    CorrectiveMaintenance,
    InstallationStartup,
    Warranty,
}

impl ServiceType {
    /// All categories in the order the form lists them.
    pub const ALL: [ServiceType; 6] = [
        ServiceType::PreventiveMaintenance,
        ServiceType::BatteryReplacement,
        ServiceType::DiagnosticReview,
        ServiceType::CorrectiveMaintenance,
        ServiceType::InstallationStartup,
        ServiceType::Warranty,
    ];

    /// Printed name of the category.
    pub fn label(self) -> &'static str {
        match self {
            ServiceType::PreventiveMaintenance => "Mantenimiento Preventivo",
            ServiceType::BatteryReplacement => "Cambio Baterías",
            ServiceType::DiagnosticReview => "Revisión Diagnóstico",
            ServiceType::CorrectiveMaintenance => "Mantenimiento Correctivo",
            ServiceType::InstallationStartup => "Instalación Arranque",
            ServiceType::Warranty => "Garantía",
        }
    }
}

impl FromStr for ServiceType {
    type Err = UnknownChoice;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalized_choice(value);
        let english = match normalized.as_str() {
            "preventive maintenance" => Some(ServiceType::PreventiveMaintenance),
            "battery replacement" => Some(ServiceType::BatteryReplacement),
            "diagnostic review" => Some(ServiceType::DiagnosticReview),
            "corrective maintenance" => Some(ServiceType::CorrectiveMaintenance),
            "installation startup" => Some(ServiceType::InstallationStartup),
            "warranty" => Some(ServiceType::Warranty),
            _ => None,
        };
        english
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|kind| normalized == normalized_choice(kind.label()))
            })
            .ok_or_else(|| UnknownChoice {
                field: "service type",
                value: value.to_string(),
            })
    }
}

/// Condition of the battery bank after the visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryStatus {
    Good,
    Fair,
    Replace,
    Replaced,
}

impl BatteryStatus {
    /// Printed name of the status.
    pub fn label(self) -> &'static str {
        match self {
            BatteryStatus::Good => "Bueno",
            BatteryStatus::Fair => "Regular",
            BatteryStatus::Replace => "Reemplazar",
            BatteryStatus::Replaced => "Reemplazado",
        }
    }
}

impl FromStr for BatteryStatus {
    type Err = UnknownChoice;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalized_choice(value).as_str() {
            "good" | "bueno" => Ok(BatteryStatus::Good),
            "fair" | "regular" => Ok(BatteryStatus::Fair),
            "replace" | "reemplazar" => Ok(BatteryStatus::Replace),
            "replaced" | "reemplazado" => Ok(BatteryStatus::Replaced),
            _ => Err(UnknownChoice {
                field: "battery status",
                value: value.to_string(),
            }),
        }
    }
}

fn optional_choice<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Static identity of the company issuing the report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    pub company: String,
    pub contact: String,
    pub address: String,
    pub city: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceDetails {
    #[serde(deserialize_with = "optional_choice")]
    pub service_type: Option<ServiceType>,
    pub equipment_model: String,
    pub equipment_serial: String,
}

/// Per-phase readings of one electrical group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseReadings {
    pub l1: Reading,
    pub l2: Reading,
    pub l3: Reading,
    /// Line-to-line (`FF`) for voltages, neutral (`N`) for currents.
    #[serde(alias = "ff", alias = "n")]
    pub neutral: Reading,
}

impl PhaseReadings {
    pub fn new(
        l1: impl Into<Reading>,
        l2: impl Into<Reading>,
        l3: impl Into<Reading>,
        neutral: impl Into<Reading>,
    ) -> Self {
        Self {
            l1: l1.into(),
            l2: l2.into(),
            l3: l3.into(),
            neutral: neutral.into(),
        }
    }

    /// Readings in column order.
    pub fn values(&self) -> [&Reading; 4] {
        [&self.l1, &self.l2, &self.l3, &self.neutral]
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElectricalReadings {
    pub input_voltage: PhaseReadings,
    pub input_current: PhaseReadings,
    pub output_voltage: PhaseReadings,
    pub output_current: PhaseReadings,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatteryReadings {
    pub voltage_total: Reading,
    pub current_discharge: Reading,
    pub voltage_test: Reading,
    pub current_test: Reading,
    pub quantity: Reading,
    /// Capacity rating in ampere hours.
    pub reference: Reading,
    /// Autonomy in minutes.
    pub autonomy: Reading,
    #[serde(deserialize_with = "optional_choice")]
    pub status: Option<BatteryStatus>,
}

/// A photo attached to the report as a data URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Photo {
    pub id: PhotoId,
    pub url: String,
    pub description: String,
}

impl Photo {
    /// Creates a photo with a freshly generated identifier.
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: PhotoId::new(),
            url: url.into(),
            description: description.into(),
        }
    }
}

/// A captured signature together with the signer's identification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    /// Data URI of the signature raster, if the signer signed on screen.
    pub image: Option<String>,
    pub name: String,
    pub id: String,
}

impl Signature {
    pub fn new(image: impl Into<String>, name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            name: name.into(),
            id: id.into(),
        }
    }

    /// Whether the signature carries anything worth printing.
    pub fn is_present(&self) -> bool {
        self.image.as_deref().is_some_and(|image| !image.is_empty())
            || !self.name.trim().is_empty()
            || !self.id.trim().is_empty()
    }
}

/// Every value collected by the form for one report.
///
/// Deserialization accepts both the grouped shape this type serializes to
/// and the flat field map the web form posts (`clientCompany`,
/// `voltageInL1`, `batteryStatus`, `clientSignature` as a bare data URI and
/// so on). When both carry a value the grouped one is kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RecordWire")]
pub struct ReportRecord {
    pub report_number: u32,
    /// Issue date, already formatted by the caller.
    pub date: String,
    pub company_info: CompanyInfo,
    pub client: ClientInfo,
    pub service: ServiceDetails,
    pub electrical: ElectricalReadings,
    pub battery: BatteryReadings,
    pub description: String,
    pub recommendations: String,
    pub photos: Vec<Photo>,
    pub client_signature: Signature,
    pub technician_signature: Signature,
}

/// A signature as posted: the bare data URI, or an `{ image, name, id }` object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignatureField {
    Image(String),
    Block(Signature),
}

/// Wire form of [`ReportRecord`], grouped and flat keys side by side.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecordWire {
    report_number: u32,
    date: String,
    company_info: CompanyInfo,
    client: ClientInfo,
    service: ServiceDetails,
    electrical: ElectricalReadings,
    battery: BatteryReadings,
    description: String,
    recommendations: String,
    photos: Vec<Photo>,
    client_signature: Option<SignatureField>,
    technician_signature: Option<SignatureField>,

    client_company: Option<String>,
    client_contact: Option<String>,
    client_address: Option<String>,
    client_city: Option<String>,
    client_email: Option<String>,
    client_phone: Option<String>,
    #[serde(deserialize_with = "optional_choice")]
    service_type: Option<ServiceType>,
    equipment_model: Option<String>,
    equipment_serial: Option<String>,

    voltage_in_l1: Reading,
    voltage_in_l2: Reading,
    voltage_in_l3: Reading,
    voltage_in_ff: Reading,
    current_in_l1: Reading,
    current_in_l2: Reading,
    current_in_l3: Reading,
    current_in_n: Reading,
    voltage_out_l1: Reading,
    voltage_out_l2: Reading,
    voltage_out_l3: Reading,
    voltage_out_ff: Reading,
    current_out_l1: Reading,
    current_out_l2: Reading,
    current_out_l3: Reading,
    current_out_n: Reading,

    battery_voltage_total: Reading,
    battery_current_discharge: Reading,
    battery_voltage_test: Reading,
    battery_current_test: Reading,
    battery_quantity: Reading,
    battery_reference: Reading,
    battery_autonomy: Reading,
    #[serde(deserialize_with = "optional_choice")]
    battery_status: Option<BatteryStatus>,

    client_signature_name: Option<String>,
    client_signature_id: Option<String>,
    #[serde(alias = "technicianSignatureName")]
    technician_name: Option<String>,
    #[serde(alias = "technicianSignatureId")]
    technician_id: Option<String>,
}

fn fill_text(target: &mut String, flat: Option<String>) {
    if target.trim().is_empty() {
        if let Some(value) = flat {
            *target = value;
        }
    }
}

fn fill_reading(target: &mut Reading, flat: Reading) {
    if target.value().is_none() && flat.value().is_some() {
        *target = flat;
    }
}

fn fill_phases(target: &mut PhaseReadings, flat: [Reading; 4]) {
    let [l1, l2, l3, neutral] = flat;
    fill_reading(&mut target.l1, l1);
    fill_reading(&mut target.l2, l2);
    fill_reading(&mut target.l3, l3);
    fill_reading(&mut target.neutral, neutral);
}

fn merge_signature(
    field: Option<SignatureField>,
    name: Option<String>,
    id: Option<String>,
) -> Signature {
    let mut signature = match field {
        Some(SignatureField::Block(block)) => block,
        Some(SignatureField::Image(image)) => Signature {
            image: Some(image).filter(|image| !image.trim().is_empty()),
            ..Signature::default()
        },
        None => Signature::default(),
    };
    fill_text(&mut signature.name, name);
    fill_text(&mut signature.id, id);
    signature
}

impl From<RecordWire> for ReportRecord {
    fn from(wire: RecordWire) -> Self {
        let mut client = wire.client;
        fill_text(&mut client.company, wire.client_company);
        fill_text(&mut client.contact, wire.client_contact);
        fill_text(&mut client.address, wire.client_address);
        fill_text(&mut client.city, wire.client_city);
        fill_text(&mut client.email, wire.client_email);
        fill_text(&mut client.phone, wire.client_phone);

        let mut service = wire.service;
        service.service_type = service.service_type.or(wire.service_type);
        fill_text(&mut service.equipment_model, wire.equipment_model);
        fill_text(&mut service.equipment_serial, wire.equipment_serial);

        let mut electrical = wire.electrical;
        fill_phases(
            &mut electrical.input_voltage,
            [wire.voltage_in_l1, wire.voltage_in_l2, wire.voltage_in_l3, wire.voltage_in_ff],
        );
        fill_phases(
            &mut electrical.input_current,
            [wire.current_in_l1, wire.current_in_l2, wire.current_in_l3, wire.current_in_n],
        );
        fill_phases(
            &mut electrical.output_voltage,
            [wire.voltage_out_l1, wire.voltage_out_l2, wire.voltage_out_l3, wire.voltage_out_ff],
        );
        fill_phases(
            &mut electrical.output_current,
            [wire.current_out_l1, wire.current_out_l2, wire.current_out_l3, wire.current_out_n],
        );

        let mut battery = wire.battery;
        fill_reading(&mut battery.voltage_total, wire.battery_voltage_total);
        fill_reading(&mut battery.current_discharge, wire.battery_current_discharge);
        fill_reading(&mut battery.voltage_test, wire.battery_voltage_test);
        fill_reading(&mut battery.current_test, wire.battery_current_test);
        fill_reading(&mut battery.quantity, wire.battery_quantity);
        fill_reading(&mut battery.reference, wire.battery_reference);
        fill_reading(&mut battery.autonomy, wire.battery_autonomy);
        battery.status = battery.status.or(wire.battery_status);

        Self {
            report_number: wire.report_number,
            date: wire.date,
            company_info: wire.company_info,
            client,
            service,
            electrical,
            battery,
            description: wire.description,
            recommendations: wire.recommendations,
            photos: wire.photos,
            client_signature: merge_signature(
                wire.client_signature,
                wire.client_signature_name,
                wire.client_signature_id,
            ),
            technician_signature: merge_signature(
                wire.technician_signature,
                wire.technician_name,
                wire.technician_id,
            ),
        }
    }
}

impl ReportRecord {
    /// Zero padded report number.
    pub fn number_label(&self) -> String {
        report_number_label(self.report_number)
    }

    /// Whether either signature block has content.
    pub fn has_signatures(&self) -> bool {
        self.client_signature.is_present() || self.technician_signature.is_present()
    }

    /// Reports questionable values without rejecting the record.
    pub fn lint(&self) -> Vec<LintFinding> {
        let mut findings = Vec::new();

        let groups = [
            ("inputVoltage", &self.electrical.input_voltage),
            ("inputCurrent", &self.electrical.input_current),
            ("outputVoltage", &self.electrical.output_voltage),
            ("outputCurrent", &self.electrical.output_current),
        ];
        for (group, readings) in groups {
            for (phase, reading) in ["l1", "l2", "l3", "neutral"].iter().zip(readings.values()) {
                check_numeric(&mut findings, format!("{}.{}", group, phase), reading);
            }
        }

        let battery = &self.battery;
        let battery_fields = [
            ("voltageTotal", &battery.voltage_total),
            ("currentDischarge", &battery.current_discharge),
            ("voltageTest", &battery.voltage_test),
            ("currentTest", &battery.current_test),
            ("quantity", &battery.quantity),
            ("autonomy", &battery.autonomy),
        ];
        for (field, reading) in battery_fields {
            check_numeric(&mut findings, format!("battery.{}", field), reading);
        }

        let mut seen = HashSet::new();
        for photo in &self.photos {
            if !seen.insert(&photo.id) {
                findings.push(LintFinding::DuplicatePhotoId(photo.id.clone()));
            }
        }

        findings
    }
}

fn check_numeric(findings: &mut Vec<LintFinding>, field: String, reading: &Reading) {
    if !reading.is_numeric() {
        findings.push(LintFinding::NonNumericReading {
            field,
            value: reading.display().to_string(),
        });
    }
}

/// A questionable value found by [`ReportRecord::lint`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LintFinding {
    /// A measurement that does not parse as a number.
    NonNumericReading { field: String, value: String },
    /// Two photos share an identifier.
    DuplicatePhotoId(PhotoId),
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNumericReading { field, value } => {
                write!(f, "reading {} is not numeric: `{}`", field, value)
            }
            Self::DuplicatePhotoId(id) => write!(f, "photo id {} is used more than once", id),
        }
    }
}
