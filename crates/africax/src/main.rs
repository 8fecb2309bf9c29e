//! `africax` - CLI for the restaurant visit tracker
//!
//! This binary resolves map points to countries, lists and edits visits, and
//! writes the map layer and CSV export.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use africax::atlas::Atlas;
use africax::cli::output::{
    render_countries, render_kpis, render_panel, render_resolution, render_visits, CountryRow,
    Resolution,
};
use africax::cli::{
    Cli, Command, ConfigCommand, CountriesCommand, CountryTarget, PanelCommand, ResolveCommand,
    RowTarget, VisitsCommand,
};
use africax::map::{map_layer, write_map_layer};
use africax::report::{kpis, CountryPanel};
use africax::visit::VisitDraft;
use africax::{init_logging, Config, Error, VisitStore};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Validation reports problems instead of failing on them
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        validate_config(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone()).context("load configuration")?;

    match cli.command {
        Command::Resolve(cmd) => handle_resolve(&config, &cmd),
        Command::Countries(cmd) => handle_countries(&config, &cmd),
        Command::Map(cmd) => handle_map(&config, cmd.output.as_deref()),
        Command::Panel(cmd) => handle_panel(&config, &cmd),
        Command::Summary(cmd) => {
            let visits = VisitStore::from_config(&config).load()?;
            print_out(&render_kpis(&kpis(&visits), &config.store.date_format, cmd.format)?);
            Ok(())
        }
        Command::Visits(cmd) => handle_visits(&config, cmd),
        Command::Export(cmd) => handle_export(&config, cmd.output.as_deref()),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn load_atlas(config: &Config) -> Result<Arc<Atlas>> {
    let path = config.geography_path();
    Atlas::load_cached(&path, &config.geography.continent)
        .with_context(|| format!("load reference geography from {}", path.display()))
}

/// Name and ISO-3 code of the country picked by `target`.
fn target_country(atlas: &Atlas, target: &CountryTarget) -> Result<(String, String)> {
    let country = if let Some((lat, lon)) = target.point() {
        atlas.resolve(lat, lon).ok_or(Error::NoCountryAt { lat, lon })?
    } else if let Some(iso) = &target.iso {
        atlas
            .get(iso)
            .ok_or_else(|| Error::UnknownCountry { iso: iso.clone() })?
    } else {
        bail!("choose a country with --iso or --lat/--lon");
    };
    Ok((country.name.clone(), country.iso_a3.clone()))
}

fn handle_resolve(config: &Config, cmd: &ResolveCommand) -> Result<()> {
    let atlas = load_atlas(config)?;
    let resolution = Resolution::new(cmd.lat, cmd.lon, atlas.resolve(cmd.lat, cmd.lon));
    print_out(&render_resolution(&resolution, cmd.format)?);
    Ok(())
}

fn handle_countries(config: &Config, cmd: &CountriesCommand) -> Result<()> {
    let atlas = load_atlas(config)?;
    let visits = VisitStore::from_config(config).load()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for visit in &visits {
        *counts.entry(visit.iso_a3.as_str()).or_default() += 1;
    }

    let mut rows: Vec<CountryRow> = atlas
        .countries()
        .iter()
        .map(|c| {
            let visits = counts.get(c.iso_a3.as_str()).copied().unwrap_or(0);
            CountryRow {
                name: c.name.clone(),
                iso_a3: c.iso_a3.clone(),
                visited: visits > 0,
                visits,
            }
        })
        .filter(|row| !cmd.visited || row.visited)
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    print_out(&render_countries(&rows, cmd.format)?);
    Ok(())
}

fn handle_map(config: &Config, output: Option<&Path>) -> Result<()> {
    let atlas = load_atlas(config)?;
    let visits = VisitStore::from_config(config).load()?;
    let layer = map_layer(&atlas, &visits);

    with_output(output, |writer| Ok(write_map_layer(&layer, writer)?))?;
    if let Some(path) = output {
        info!("Wrote map layer to {}", path.display());
    }
    Ok(())
}

fn handle_panel(config: &Config, cmd: &PanelCommand) -> Result<()> {
    let atlas = load_atlas(config)?;
    let (name, iso) = target_country(&atlas, &cmd.target)?;
    let visits = VisitStore::from_config(config).load()?;

    let panel = CountryPanel::new(name, &iso, &visits);
    print_out(&render_panel(
        &panel,
        &config.raters(),
        &config.store.date_format,
        cmd.format,
    )?);
    Ok(())
}

fn handle_visits(config: &Config, cmd: VisitsCommand) -> Result<()> {
    let mut store = VisitStore::from_config(config);

    match cmd {
        VisitsCommand::List { country, format } => {
            let mut visits = store.load()?;
            if let Some(iso) = country {
                let iso = iso.trim().to_uppercase();
                visits.retain(|v| v.iso_a3 == iso);
            }
            print_out(&render_visits(
                &visits,
                &config.raters(),
                &config.store.date_format,
                format,
            )?);
        }
        VisitsCommand::Add {
            target,
            country,
            fields,
        } => {
            let (name, iso) = match (country, &target.iso) {
                (Some(name), Some(iso)) => (name, iso.clone()),
                (name, _) => {
                    let atlas = load_atlas(config)?;
                    let (resolved, iso) = target_country(&atlas, &target)?;
                    (name.unwrap_or(resolved), iso)
                }
            };

            let mut draft = VisitDraft::new(name, iso, "");
            fields.apply_to(&mut draft);
            let id = store.append(&draft)?;
            println!("Visit added ({id}).");
        }
        VisitsCommand::Update { row, fields } => {
            let position = row_position(&store, &row)?;
            let mut draft = store.get(position)?.to_draft(&config.store.date_format);
            fields.apply_to(&mut draft);
            store.update(position, &draft)?;
            println!("Visit at row {position} updated.");
        }
        VisitsCommand::Delete { row } => {
            let position = row_position(&store, &row)?;
            let visit = store.get(position)?;
            store.delete(position)?;
            println!("Deleted {} (row {position}).", visit.restaurant);
        }
    }
    Ok(())
}

fn row_position(store: &VisitStore, row: &RowTarget) -> Result<usize> {
    match (&row.id, row.position) {
        (Some(id), _) => Ok(store.position_of(id)?),
        (None, Some(position)) => Ok(position),
        (None, None) => bail!("give a row position or --id"),
    }
}

fn handle_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let mut store = VisitStore::from_config(config);
    let count = with_output(output, |writer| Ok(store.export(writer)?))?;
    if let Some(path) = output {
        info!(visits = count, "Exported visits to {}", path.display());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Data]");
                println!("  Visits file:        {}", config.visits_path().display());
                println!("  Geography file:     {}", config.geography_path().display());
                println!();
                println!("[Geography]");
                println!("  Continent:          {}", config.geography.continent);
                println!();
                println!("[Store]");
                println!("  Raters:             {}", config.raters().join(", "));
                println!("  Date format:        {}", config.store.date_format);
                println!(
                    "  Keep group rating:  {}",
                    config.store.keep_supplied_group_rating
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => validate_config(file),
    }
    Ok(())
}

fn validate_config(file: Option<PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

/// Run `write` against the file at `path`, or stdout when there is none.
fn with_output<T>(
    path: Option<&Path>,
    write: impl FnOnce(&mut dyn Write) -> Result<T>,
) -> Result<T> {
    match path {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            let value = write(&mut writer)?;
            writer.flush()?;
            Ok(value)
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            let value = write(&mut lock)?;
            lock.flush()?;
            Ok(value)
        }
    }
}

fn print_out(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
}
