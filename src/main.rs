use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pubchem_client::config::{find_config_file, get_config, load_config, Config};
use pubchem_client::models::{
    Compound, DownloadRequest, Identifier, OutputFormat as WireFormat, PropertyRow, PropertyTag,
    Query, SearchSpec,
};
use pubchem_client::{Domain, PubChemClient};
use std::io::IsTerminal;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PubChem command line client - look up compounds, properties and identifiers
#[derive(Parser, Debug)]
#[command(name = "pubchem")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query the PubChem PUG REST service", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Identifier namespace of the input
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Namespace {
    Cid,
    Name,
    Smiles,
    Inchi,
    Inchikey,
    Formula,
}

/// Structure search kind
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SearchKind {
    Substructure,
    Superstructure,
    Similarity,
    Identity,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceDomain {
    Substance,
    Assay,
}

/// File formats for downloads
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    Json,
    Xml,
    Asnt,
    Asnb,
    Sdf,
    Csv,
    Png,
    Txt,
}

impl From<FileFormat> for WireFormat {
    fn from(format: FileFormat) -> Self {
        match format {
            FileFormat::Json => WireFormat::Json,
            FileFormat::Xml => WireFormat::Xml,
            FileFormat::Asnt => WireFormat::Asnt,
            FileFormat::Asnb => WireFormat::Asnb,
            FileFormat::Sdf => WireFormat::Sdf,
            FileFormat::Csv => WireFormat::Csv,
            FileFormat::Png => WireFormat::Png,
            FileFormat::Txt => WireFormat::Txt,
        }
    }
}

/// The compound an operation starts from
#[derive(clap::Args, Debug)]
struct Target {
    /// Identifier value (comma-separated CIDs are accepted)
    identifier: String,

    /// Namespace of the identifier
    #[arg(long, short, value_enum, default_value_t = Namespace::Name)]
    namespace: Namespace,

    /// Run a structure search instead of an exact lookup
    #[arg(long, value_enum)]
    search: Option<SearchKind>,

    /// Similarity threshold in percent
    #[arg(long, default_value_t = 90, requires = "search")]
    threshold: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch full compound records
    #[command(alias = "c")]
    Compound {
        #[command(flatten)]
        target: Target,

        /// Request the 3D conformer record
        #[arg(long)]
        three_d: bool,
    },

    /// Fetch a property table
    #[command(alias = "p")]
    Properties {
        #[command(flatten)]
        target: Target,

        /// Properties to fetch (server names or snake_case, comma-separated)
        #[arg(
            long,
            short,
            value_delimiter = ',',
            default_value = "MolecularFormula,MolecularWeight,SMILES,IUPACName"
        )]
        properties: Vec<String>,
    },

    /// List synonyms
    Synonyms {
        #[command(flatten)]
        target: Target,

        /// Maximum number of synonyms per record
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// List matching CIDs
    Cids {
        #[command(flatten)]
        target: Target,

        /// Maximum number of results (formula and structure searches)
        #[arg(long)]
        count: Option<u32>,

        /// Offset of the first result (formula and structure searches)
        #[arg(long)]
        start: Option<u32>,
    },

    /// Save records to a file
    #[command(alias = "d")]
    Download {
        #[command(flatten)]
        target: Target,

        /// File format requested from PubChem
        #[arg(long, short, value_enum, default_value_t = FileFormat::Sdf)]
        format: FileFormat,

        /// Destination file (default: <identifier>.<ext>)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,

        /// Request 3D conformer records
        #[arg(long)]
        three_d: bool,
    },

    /// List depositors
    Sources {
        #[arg(value_enum, default_value_t = SourceDomain::Substance)]
        domain: SourceDomain,
    },

    /// Show or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration to a file
    Init {
        /// Destination (default: ./pubchem.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Target {
    fn query(&self) -> Result<Query> {
        let identifier = match self.namespace {
            Namespace::Cid => {
                let cids = self
                    .identifier
                    .split(',')
                    .map(|id| id.trim().parse::<u64>())
                    .collect::<Result<Vec<_>, _>>()
                    .with_context(|| format!("invalid CID list: {}", self.identifier))?;
                Identifier::cids(cids)
            }
            Namespace::Name => Identifier::name(&self.identifier),
            Namespace::Smiles => Identifier::smiles(&self.identifier),
            Namespace::Inchi => Identifier::inchi(&self.identifier),
            Namespace::Inchikey => Identifier::inchikey(&self.identifier),
            Namespace::Formula => Identifier::formula(&self.identifier),
        };

        let mut query = Query::compound(identifier);
        if let Some(kind) = self.search {
            query = query.search(match kind {
                SearchKind::Substructure => SearchSpec::substructure(),
                SearchKind::Superstructure => SearchSpec::superstructure(),
                SearchKind::Similarity => SearchSpec::similarity(self.threshold),
                SearchKind::Identity => SearchSpec::identity(),
            });
        }
        Ok(query)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("pubchem_client={},pubchem={}", env_filter, env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from file if specified or found in default locations
    let config = if let Some(config_path) = &cli.config {
        load_config(config_path)?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)?
    } else {
        get_config()?
    };

    // Ctrl-C cancels in-flight polling and retries
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let client = PubChemClient::from_config(&config)?.with_cancellation(cancel);
    let format = resolve_format(cli.output);

    match cli.command {
        Commands::Compound { target, three_d } => {
            let mut query = target.query()?;
            if three_d {
                query = query.record_type_3d();
            }
            let compounds = client.get_compounds(query).await?;
            if compounds.is_empty() && !cli.quiet {
                eprintln!("No compounds found for {}", target.identifier);
            }
            output_compounds(&compounds, format)?;
        }

        Commands::Properties { target, properties } => {
            let rows = client.get_properties(properties, target.query()?).await?;
            if rows.is_empty() && !cli.quiet {
                eprintln!("No compounds found for {}", target.identifier);
            }
            output_properties(&rows, format)?;
        }

        Commands::Synonyms { target, limit } => {
            let sets = client.get_synonyms(target.query()?).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sets)?),
                _ => {
                    for set in &sets {
                        if let Some(cid) = set.cid {
                            println!("CID {}", cid);
                        }
                        for name in set.synonyms.iter().take(limit) {
                            println!("  {}", name);
                        }
                        if set.synonyms.len() > limit && !cli.quiet {
                            println!("  ... {} more", set.synonyms.len() - limit);
                        }
                    }
                }
            }
        }

        Commands::Cids {
            target,
            count,
            start,
        } => {
            let mut query = target.query()?;
            if let Some(count) = count {
                query = query.count(count);
            }
            if let Some(start) = start {
                query = query.start(start);
            }
            let cids = client.get_cids(query).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cids)?),
                _ => {
                    for cid in &cids {
                        println!("{}", cid);
                    }
                }
            }
            if !cli.quiet {
                eprintln!("{} CIDs", cids.len());
            }
        }

        Commands::Download {
            target,
            format: file_format,
            path,
            overwrite,
            three_d,
        } => {
            let wire: WireFormat = file_format.into();
            let path = path.unwrap_or_else(|| {
                let stem: String = target
                    .identifier
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect();
                PathBuf::from(format!("{}.{}", stem, wire.extension()))
            });

            let mut query = target.query()?;
            if three_d {
                query = query.record_type_3d();
            }
            let request =
                DownloadRequest::new(wire, path).overwrite(overwrite || config.downloads.overwrite);
            let result = client.download(query, request).await?;
            if !cli.quiet {
                eprintln!("Saved {} bytes to {}", result.bytes, result.path.display());
            }
        }

        Commands::Sources { domain } => {
            let domain = match domain {
                SourceDomain::Substance => Domain::Substance,
                SourceDomain::Assay => Domain::Assay,
            };
            let sources = client.get_all_sources(domain).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sources)?),
                _ => {
                    for source in &sources {
                        println!("{}", source);
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml()?),
            ConfigAction::Init { path, force } => {
                let path = path.unwrap_or_else(|| PathBuf::from("pubchem.toml"));
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to replace it)", path.display());
                }
                Config::default().save(&path)?;
                if !cli.quiet {
                    eprintln!("Wrote {}", path.display());
                }
            }
        },
    }

    Ok(())
}

fn resolve_format(format: OutputFormat) -> OutputFormat {
    if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn output_compounds(compounds: &[Compound], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(compounds)?);
        }
        OutputFormat::Plain => {
            for compound in compounds {
                println!(
                    "{} {} {}",
                    compound,
                    compound.molecular_formula().unwrap_or("-"),
                    compound.smiles().unwrap_or("-")
                );
            }
        }
        _ => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["CID", "Formula", "Weight", "SMILES", "IUPAC Name"]);

            for compound in compounds {
                table.add_row(vec![
                    Cell::new(
                        compound
                            .cid()
                            .map(|cid| cid.to_string())
                            .unwrap_or_default(),
                    )
                    .add_attribute(Attribute::Bold),
                    Cell::new(compound.molecular_formula().unwrap_or_default()),
                    Cell::new(
                        compound
                            .molecular_weight()
                            .map(|w| format!("{:.2}", w))
                            .unwrap_or_default(),
                    ),
                    Cell::new(truncate(compound.smiles().unwrap_or_default(), 40)),
                    Cell::new(truncate(compound.iupac_name().unwrap_or_default(), 40)),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

fn output_properties(rows: &[PropertyRow], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    // Columns in the order the tags are documented, then unknown columns
    let tags: Vec<PropertyTag> = PropertyTag::ALL
        .iter()
        .copied()
        .filter(|tag| rows.iter().any(|row| row.get(*tag).is_some()))
        .collect();
    let mut extra: Vec<&String> = rows.iter().flat_map(|row| row.extra.keys()).collect();
    extra.sort();
    extra.dedup();

    let cell = |row: &PropertyRow, tag: PropertyTag| -> String {
        row.get(tag)
            .map(|value| match value.as_str() {
                Some(text) => text.to_string(),
                None => serde_json::to_string(value).unwrap_or_default(),
            })
            .unwrap_or_default()
    };

    if format == OutputFormat::Plain {
        for row in rows {
            let mut fields = vec![row.cid.map(|c| c.to_string()).unwrap_or_default()];
            fields.extend(tags.iter().map(|tag| cell(row, *tag)));
            fields.extend(extra.iter().map(|key| {
                row.extra.get(*key).map(|v| v.to_string()).unwrap_or_default()
            }));
            println!("{}", fields.join("\t"));
        }
        return Ok(());
    }

    use comfy_table::{Cell, Table};
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    let mut header = vec!["CID".to_string()];
    header.extend(tags.iter().map(|tag| tag.server_name().to_string()));
    header.extend(extra.iter().map(|key| key.to_string()));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![Cell::new(row.cid.map(|c| c.to_string()).unwrap_or_default())];
        cells.extend(tags.iter().map(|tag| Cell::new(truncate(&cell(row, *tag), 40))));
        cells.extend(extra.iter().map(|key| {
            Cell::new(row.extra.get(*key).map(|v| v.to_string()).unwrap_or_default())
        }));
        table.add_row(cells);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_property_list() {
        let cli = Cli::try_parse_from([
            "pubchem",
            "properties",
            "aspirin",
            "-p",
            "molecular_weight,xlogp",
        ])
        .unwrap();
        match cli.command {
            Commands::Properties { target, properties } => {
                assert_eq!(target.identifier, "aspirin");
                assert_eq!(properties, vec!["molecular_weight", "xlogp"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_target_builds_similarity_query() {
        let cli = Cli::try_parse_from([
            "pubchem",
            "cids",
            "CCO",
            "--namespace",
            "smiles",
            "--search",
            "similarity",
            "--threshold",
            "95",
        ])
        .unwrap();
        let Commands::Cids { target, .. } = cli.command else {
            panic!("expected cids");
        };
        let query = target.query().unwrap();
        assert!(query.is_async());
        let search = query.search.unwrap();
        assert_eq!(search.options.get("Threshold").map(String::as_str), Some("95"));
    }

    #[test]
    fn test_cid_list_must_be_numeric() {
        let target = Target {
            identifier: "2244,abc".to_string(),
            namespace: Namespace::Cid,
            search: None,
            threshold: 90,
        };
        assert!(target.query().is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("aspirin", 10), "aspirin");
        assert_eq!(truncate("acetylsalicylic acid", 10), "acetyls...");
    }
}
