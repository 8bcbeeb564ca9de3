// This file is part of zonekit.
//
// zonekit is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// zonekit is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with zonekit.  If not, see <http://www.gnu.org/licenses/>.

//! Builds one `.ff` file per named project, or dumps the asset index of an
//! already-built one (spec §6.4).

use anyhow::{Context, Result};
use graph::SchemaRegistry;
use layout::BlockId;
use log::info;
use loader_stringtable::StringTableLoader;
use search_path::{DirectorySource, SearchPath};
use std::fs::File;
use std::path::PathBuf;
use structopt::StructOpt;
use zone::{BuildConfig, Generation, LoaderRegistry, Zone};

#[derive(Debug, StructOpt)]
#[structopt(name = "linker", about = "Builds fast-file zones from zone definitions")]
struct Opt {
    /// Raise logging verbosity; repeatable (-v, -vv, -vvv)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Directories searched for `.zone` definitions, lowest priority first
    #[structopt(long = "asset-search-path", parse(from_os_str))]
    asset_search_path: Vec<PathBuf>,

    /// Directory searched for GDT entries
    #[structopt(long = "gdt-search-path", parse(from_os_str))]
    gdt_search_path: Option<PathBuf>,

    /// Directories searched for raw asset source files, lowest priority first
    #[structopt(long = "source-search-path", parse(from_os_str))]
    source_search_path: Vec<PathBuf>,

    /// Instead of building, load this `.ff` file and print its asset index
    #[structopt(long = "load", parse(from_os_str))]
    load: Option<PathBuf>,

    /// Directory built `.ff` files are written into
    #[structopt(short = "o", long = "output", parse(from_os_str), default_value = ".")]
    output: PathBuf,

    /// Honor an ignored project's own `ignore` directives (spec §9 open question (b))
    #[structopt(long = "strict-ignore")]
    strict_ignore: bool,

    /// Project names to build, each resolved as `<name>.zone`
    projects: Vec<String>,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let schemas = schema_registry();
    let loaders = loader_registry();

    if let Some(path) = &opt.load {
        return dump_zone(path, &schemas);
    }

    if opt.projects.is_empty() {
        anyhow::bail!("no project named and no --load file given; nothing to do");
    }

    let asset_search_path = directory_search_path(&opt.asset_search_path)?;
    let gdt_search_path = opt
        .gdt_search_path
        .as_ref()
        .map(|p| directory_search_path(std::slice::from_ref(p)))
        .transpose()?;
    let source_search_path = if opt.source_search_path.is_empty() {
        directory_search_path(&opt.asset_search_path)?
    } else {
        directory_search_path(&opt.source_search_path)?
    };

    std::fs::create_dir_all(&opt.output)
        .with_context(|| format!("creating output directory {:?}", opt.output))?;

    let mut built: Vec<Zone> = Vec::new();
    for project in &opt.projects {
        let config = BuildConfig {
            loaders: &loaders,
            asset_search_path: &asset_search_path,
            gdt_search_path: gdt_search_path.as_ref(),
            source_search_path: &source_search_path,
            strict_ignore: opt.strict_ignore,
        };
        let zone = Zone::build(project, &config)
            .with_context(|| format!("building project {project:?}"))?;

        let profile = zone.generation.profile();
        let out_path = opt.output.join(format!("{}.ff", zone.name));
        let mut out = File::create(&out_path)
            .with_context(|| format!("creating {out_path:?}"))?;
        zone.write_to(&schemas, &profile, &built, &mut out)
            .with_context(|| format!("writing {out_path:?}"))?;
        info!("{project:?} -> {out_path:?} ({} assets)", zone.pool.len());
        built.push(zone);
    }

    Ok(())
}

fn dump_zone(path: &PathBuf, schemas: &SchemaRegistry) -> Result<()> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let generations = [Generation::G1, Generation::G2, Generation::G3, Generation::G4, Generation::G5];
    let mut last_err = None;
    for generation in generations {
        let profile = generation.profile();
        let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
        match Zone::read_from(name.clone(), schemas, &profile, &[], file) {
            Ok(zone) => {
                println!("{} ({:?}, {} assets):", zone.name, zone.generation, zone.pool.len());
                for record in zone.pool.iter_flat() {
                    println!("  {:?} {}", record.kind, record.name);
                }
                return Ok(());
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap()).with_context(|| format!("{path:?} did not match any known generation's magic"))
}

fn directory_search_path(dirs: &[PathBuf]) -> Result<SearchPath> {
    let mut sources: Vec<Box<dyn search_path::Source>> = Vec::with_capacity(dirs.len());
    for (priority, dir) in dirs.iter().enumerate() {
        let name = dir.to_string_lossy().into_owned();
        sources.push(Box::new(
            DirectorySource::new(&name, priority as i64, dir)
                .with_context(|| format!("indexing search path directory {dir:?}"))?,
        ));
    }
    if sources.is_empty() {
        sources.push(Box::new(DirectorySource::new(".", 0, ".")?));
    }
    Ok(SearchPath::with_sources(sources)?)
}

fn schema_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    loader_stringtable::register_schema(&mut registry, BlockId(1));
    registry
}

fn loader_registry() -> LoaderRegistry {
    let mut registry = LoaderRegistry::new();
    registry.register(Box::new(StringTableLoader));
    registry
}
