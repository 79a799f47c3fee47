use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use service_report::delivery::{
    handle_send_report, MailSettings, Method, OutboxTransport, ReportMailer,
};
use service_report::images::ImageSource;
use service_report::{Letterhead, ReportBuilder, ReportRecord};

/// Renders technical service reports and queues them for delivery.
///
/// Fonts are looked up in `REPORT_FONTS_DIR`, then `assets/fonts`, then the
/// system Liberation Sans installation.
#[derive(Parser)]
#[command(author, version, about = "Technical service report tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a report record (JSON) to a PDF file.
    Render {
        /// Path of the report record JSON.
        #[arg(long)]
        record: PathBuf,
        /// Where to write the PDF.
        #[arg(long, default_value = "reporte.pdf")]
        output: PathBuf,
        /// Use a captured header image instead of the drawn letterhead.
        #[arg(long, conflicts_with = "logo")]
        header_image: Option<PathBuf>,
        /// Custom logo placed in the drawn letterhead.
        #[arg(long)]
        logo: Option<PathBuf>,
        /// Leave out the page footer.
        #[arg(long)]
        no_footer: bool,
    },

    /// Process a `send-report` payload and spool the message into an outbox.
    Send {
        /// Path of the payload JSON (`formData` and `emailData`).
        #[arg(long)]
        payload: PathBuf,
        /// Outbox directory.
        #[arg(long, default_value = "outbox")]
        outbox: PathBuf,
        /// Sender address. When omitted, the sender and the relay written into
        /// each envelope come from the SMTP_* variables; only SMTP_FROM (or
        /// SMTP_USER) is required.
        #[arg(long)]
        from: Option<String>,
    },
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render {
            record,
            output,
            header_image,
            logo,
            no_footer,
        } => render(record, output, header_image, logo, no_footer),
        Commands::Send {
            payload,
            outbox,
            from,
        } => send(payload, outbox, from),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn render(
    record: PathBuf,
    output: PathBuf,
    header_image: Option<PathBuf>,
    logo: Option<PathBuf>,
    no_footer: bool,
) -> Result<(), Box<dyn Error>> {
    let record: ReportRecord = serde_json::from_slice(&fs::read(&record)?)?;

    let letterhead = match (header_image, logo) {
        (Some(header), _) => Letterhead::Captured(ImageSource::from_path(header)),
        (None, Some(logo)) => Letterhead::with_logo(ImageSource::from_path(logo)),
        (None, None) => Letterhead::default(),
    };

    let report = ReportBuilder::new()
        .with_letterhead(letterhead)
        .with_page_footer(!no_footer)
        .build(&record)?;
    report.write_to(&output)?;

    info!(
        "Wrote {} ({} page(s), {} photo(s), {} skipped)",
        output.display(),
        report.page_count,
        report.embedded_photos,
        report.skipped_photos.len()
    );
    Ok(())
}

fn send(payload: PathBuf, outbox: PathBuf, from: Option<String>) -> Result<(), Box<dyn Error>> {
    let transport = match from {
        Some(from) => OutboxTransport::new(outbox, from),
        None => OutboxTransport::from_settings(outbox, &MailSettings::from_env()?),
    };
    let mailer = ReportMailer::new(transport);

    let response = handle_send_report(&Method::Post, &fs::read(&payload)?, &mailer);
    println!("{}", response.body());
    if response.status != 200 {
        return Err(format!("send-report answered with status {}", response.status).into());
    }
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
