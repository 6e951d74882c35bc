//! nfse-national CLI
//!
//! Identifier helpers, signing and verification of DPS/event XML, schema
//! validation, transport encoding and the remote queries of the national API.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use nfse_national::{
    build_document_id, build_event_id, build_event_id_checked,
    domain::constants::CANCELLATION_EVENT_CODE,
    infra::config::DEFAULT_PASSWORD_ENV,
    now_timestamp,
    services::xsd_patch::patch_xsd_file,
    ClientConfiguration, ConfigManager, CredentialInput, DocumentKind, DpsIdFields,
    GenerateOptions, NfseClient, NfseError, ReferenceTarget, SchemaValidator, SignatureVerifier,
    TransportCodec, XmlSigner, XmllintValidator,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nfse-national")]
#[command(about = "DPS and event XML tooling for the national NFS-e API")]
#[command(long_about = "
nfse-national - DPS/event XML signing, validation and submission

EXAMPLES:
    # Build a DPS identifier
    nfse-national dps-id 3304557 2 38.027.543/0001-75 900 1

    # Sign a rendered DPS with a PKCS#12 certificate
    NFSE_CERT_PASSWORD=secret nfse-national sign dps.xml --cert cert.pfx \\
        --id DPS330455723802754300017500900000000000000001 -o dps-signed.xml

    # Validate against the published schemas
    nfse-national validate dps-signed.xml --schema-dir ./xsd

    # Produce the JSON submission body
    nfse-national encode dps-signed.xml

ENVIRONMENT VARIABLES:
    NFSE_CERT_PASSWORD  Certificate password (name configurable)
    RUST_LOG            Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Dps,
    Cancellation,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Dps => DocumentKind::Dps,
            KindArg::Cancellation => DocumentKind::Cancellation,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a 45-character DPS identifier
    DpsId {
        municipality_code: String,
        /// 1 = CPF, 2 = CNPJ
        taxpayer_id_type: String,
        /// CPF/CNPJ, punctuation allowed
        taxpayer_id: String,
        series: String,
        number: String,
        /// Reject inputs with the wrong widths instead of building anyway
        #[arg(long)]
        strict: bool,
    },

    /// Build a 59-character event identifier
    EventId {
        /// 50-digit access key
        access_key: String,
        #[arg(long, default_value = CANCELLATION_EVENT_CODE)]
        code: String,
        #[arg(long)]
        strict: bool,
    },

    /// Print the current time in the layout's timestamp format
    Timestamp,

    /// Render a document from a JSON data model with the configured templates
    Generate {
        #[arg(value_enum)]
        kind: KindArg,
        /// JSON data model; must carry `id`
        data: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Validate with the configured schemas
        #[arg(long)]
        validate: bool,
    },

    /// Sign an XML document with an enveloped signature
    Sign {
        input: PathBuf,
        /// PKCS#12 or PEM bundle (defaults to the configured certificate)
        #[arg(long, value_name = "FILE")]
        cert: Option<PathBuf>,
        /// Environment variable holding the certificate password
        #[arg(long, default_value = DEFAULT_PASSWORD_ENV)]
        password_env: String,
        /// Local name of the element to sign
        #[arg(long, default_value = "infDPS")]
        element: String,
        /// Id referenced by the signature; read from the element when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify the enveloped signature of a document
    Verify { input: PathBuf },

    /// Validate a document with xmllint against an XSD
    Validate {
        input: PathBuf,
        #[arg(value_enum, long, default_value = "dps")]
        kind: KindArg,
        /// Directory with the XSD files (defaults to the configured one)
        #[arg(long)]
        schema_dir: Option<PathBuf>,
        /// Schema file name, overriding the kind's default
        #[arg(long)]
        schema: Option<String>,
    },

    /// Print the JSON submission body for a signed document
    Encode {
        input: PathBuf,
        #[arg(value_enum, long, default_value = "dps")]
        kind: KindArg,
    },

    /// Rewrite XSD pattern facets so libxml2 accepts them
    FixXsd { files: Vec<PathBuf> },

    /// Submit a signed DPS
    Issue { input: PathBuf },

    /// Submit a signed cancellation event
    Cancel {
        input: PathBuf,
        #[arg(long)]
        access_key: String,
    },

    /// Query an NFS-e by access key
    GetNfse { access_key: String },

    /// Query a DPS by id
    GetDps { dps_id: String },

    /// Check whether a DPS exists
    CheckDps { dps_id: String },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set { key: String, value: String },
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };

    match cli.command {
        Commands::DpsId {
            municipality_code,
            taxpayer_id_type,
            taxpayer_id,
            series,
            number,
            strict,
        } => {
            let id = if strict {
                DpsIdFields::checked(
                    municipality_code,
                    taxpayer_id_type,
                    taxpayer_id,
                    series,
                    number,
                )?
                .build()
            } else {
                build_document_id(
                    &municipality_code,
                    &taxpayer_id_type,
                    &taxpayer_id,
                    &series,
                    &number,
                )
            };
            println!("{id}");
        }

        Commands::EventId {
            access_key,
            code,
            strict,
        } => {
            let id = if strict {
                build_event_id_checked(&access_key, &code)?
            } else {
                build_event_id(&access_key, &code)
            };
            println!("{id}");
        }

        Commands::Timestamp => println!("{}", now_timestamp()),

        Commands::Generate {
            kind,
            data,
            output,
            validate,
        } => {
            let config = manager.load_or_default()?;
            let model: serde_json::Value = serde_json::from_str(&read(&data)?)
                .into_diagnostic()
                .wrap_err_with(|| format!("{} is not valid JSON", data.display()))?;
            let client = NfseClient::from_config(config.clone())?;
            let options = GenerateOptions {
                suppress_signing_warning: config.suppress_signing_warning,
                validate,
                ..GenerateOptions::default()
            };
            let generated = match DocumentKind::from(kind) {
                DocumentKind::Dps => client.generate_dps_xml(&model, options)?,
                DocumentKind::Cancellation => client.generate_cancellation_xml(&model, options)?,
            };
            for warning in &generated.warnings {
                eprintln!("warning: {warning}");
            }
            write_or_print(output, &generated.xml)?;
        }

        Commands::Sign {
            input,
            cert,
            password_env,
            element,
            id,
            output,
        } => {
            let config = manager.load_or_default()?;
            let cert = cert
                .or(config.certificate_path)
                .ok_or_else(|| miette::miette!("no certificate given (--cert or config)"))?;
            let password = std::env::var(&password_env).ok();
            let store =
                nfse_national::CertificateStore::new(Some(CredentialInput::Path(cert)), password);
            let key_material = store.require_key_material()?;

            let xml = read(&input)?;
            let minified = nfse_national::minify_xml(&xml);
            let target = ReferenceTarget::new(element, id.unwrap_or_default());
            let signed = XmlSigner::new().sign(&minified, &target, key_material)?;
            write_or_print(output, signed.as_str())?;
        }

        Commands::Verify { input } => {
            let report = SignatureVerifier::new().verify(&read(&input)?)?;
            println!("Reference:  {}", report.reference_uri);
            println!("Found:      {}", report.reference_found);
            println!("Digest:     {}", ok(report.digest_ok));
            println!("Signature:  {}", ok(report.signature_ok));
            if !report.success() {
                return Err(miette::miette!("signature verification failed"));
            }
        }

        Commands::Validate {
            input,
            kind,
            schema_dir,
            schema,
        } => {
            let config = manager.load_or_default()?;
            let kind = DocumentKind::from(kind);
            let schema_dir = schema_dir
                .or(config.schema_dir)
                .ok_or_else(|| miette::miette!("no schema directory (--schema-dir or config)"))?;
            let mut validator =
                XmllintValidator::new(schema_dir).with_executable(config.xmllint_path);
            if let Some(scratch) = config.scratch_dir {
                validator = validator.with_scratch_dir(scratch);
            }
            let schema = schema.unwrap_or_else(|| kind.schema().to_string());
            validator.validate_strict(&read(&input)?, &schema, kind.scratch_prefix())?;
            println!("{} validates against {schema}", input.display());
        }

        Commands::Encode { input, kind } => {
            let kind = DocumentKind::from(kind);
            let envelope = TransportCodec::encode(&read(&input)?, kind.envelope_field())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&envelope).into_diagnostic()?
            );
        }

        Commands::FixXsd { files } => {
            for file in files {
                let changed = patch_xsd_file(&file)?;
                println!(
                    "{}: {}",
                    file.display(),
                    if changed { "patched" } else { "unchanged" }
                );
            }
        }

        Commands::Issue { input } => {
            let client = remote_client(&manager)?;
            let response = client.issue_nfse(read(&input)?).await.map_err(report_remote)?;
            print_json(&response)?;
        }

        Commands::Cancel { input, access_key } => {
            let client = remote_client(&manager)?;
            let response = client
                .cancel_nfse(read(&input)?, Some(access_key.as_str()))
                .await
                .map_err(report_remote)?;
            print_json(&response)?;
        }

        Commands::GetNfse { access_key } => {
            let client = remote_client(&manager)?;
            print_json(&client.get_nfse(&access_key).await.map_err(report_remote)?)?;
        }

        Commands::GetDps { dps_id } => {
            let client = remote_client(&manager)?;
            print_json(&client.get_dps(&dps_id).await.map_err(report_remote)?)?;
        }

        Commands::CheckDps { dps_id } => {
            let client = remote_client(&manager)?;
            let head = client.check_dps(&dps_id).await.map_err(report_remote)?;
            println!("HTTP {}", head.status);
            for (name, value) in head.headers {
                println!("{name}: {value}");
            }
        }

        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => {
                let config = manager.load_or_create_default()?;
                println!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
            }
            ConfigCommands::Set { key, value } => {
                manager.update_value(&key, &value)?;
                println!("{key} = {value}");
            }
            ConfigCommands::Path => println!("{}", manager.config_path().display()),
        },
    }

    Ok(())
}

fn remote_client(manager: &ConfigManager) -> Result<NfseClient> {
    let config: ClientConfiguration = manager.load_or_default()?;
    Ok(NfseClient::from_config(config)?)
}

/// Print the rejection body before handing the error to miette.
fn report_remote(err: NfseError) -> NfseError {
    if let Some(body) = err.response_body().filter(|b| !b.is_empty()) {
        eprintln!("{body}");
    }
    err
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn write_or_print(output: Option<PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(&path, content)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn ok(flag: bool) -> &'static str {
    if flag {
        "OK"
    } else {
        "FAILED"
    }
}
