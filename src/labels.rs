//! Printed text of the report.

pub const PLACEHOLDER: &str = "-";

pub const TITLE: &str = "Reporte Técnico";
pub const NUMBER_PREFIX: &str = "N°";
pub const DATE_PREFIX: &str = "Fecha:";
pub const PAGE: &str = "Página";
pub const FOOTER_PREFIX: &str = "Reporte N°";

pub const CLIENT_SECTION: &str = "Información del Cliente";
pub const SERVICE_SECTION: &str = "Detalles del Servicio";
pub const ELECTRICAL_SECTION: &str = "Parámetros Eléctricos";
pub const BATTERY_SECTION: &str = "Parámetros de Baterías";
pub const DESCRIPTION_SECTION: &str = "Descripción del Trabajo";
pub const RECOMMENDATIONS_SECTION: &str = "Recomendaciones";
pub const PHOTOS_SECTION: &str = "Registro Fotográfico";
pub const SIGNATURES_SECTION: &str = "Firmas";

pub const CLIENT_FIELDS: [&str; 6] = [
    "Empresa",
    "Contacto",
    "Dirección",
    "Ciudad",
    "Email",
    "Teléfono",
];

pub const SERVICE_FIELDS: [&str; 3] = ["Tipo de Servicio", "Modelo Equipo", "Serial Equipo"];

pub const INPUT_VOLTAGE: &str = "Voltaje de Entrada";
pub const INPUT_CURRENT: &str = "Corriente de Entrada";
pub const OUTPUT_VOLTAGE: &str = "Voltaje de Salida";
pub const OUTPUT_CURRENT: &str = "Corriente de Salida";

pub const VOLTAGE_PHASES: [&str; 4] = ["L1", "L2", "L3", "FF"];
pub const CURRENT_PHASES: [&str; 4] = ["L1", "L2", "L3", "N"];

pub const BATTERY_HEADER: [&str; 2] = ["Parámetro", "Valor"];
pub const BATTERY_VOLTAGE_TOTAL: &str = "Voltaje Total";
pub const BATTERY_CURRENT_DISCHARGE: &str = "Corriente Descarga";
pub const BATTERY_VOLTAGE_TEST: &str = "Voltaje Prueba";
pub const BATTERY_CURRENT_TEST: &str = "Corriente Prueba";
pub const BATTERY_QUANTITY: &str = "Cantidad Baterías";
pub const BATTERY_REFERENCE: &str = "Referencia";
pub const BATTERY_AUTONOMY: &str = "Autonomía";
pub const BATTERY_STATUS: &str = "Estado";

pub const CLIENT_SIGNATURE: &str = "Firma del Cliente";
pub const TECHNICIAN_SIGNATURE: &str = "Firma del Técnico";
pub const SIGNER_NAME: &str = "Nombre:";
pub const SIGNER_ID: &str = "ID:";

pub const EMAIL_SUBJECT_PREFIX: &str = "Reporte Técnico N°";
pub const PDF_ATTACHMENT_PREFIX: &str = "Reporte_Tecnico_";
pub const PHOTO_ATTACHMENT_PREFIX: &str = "Foto_";
