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

//! The zone driver (spec §4.7): parses a zone definition, dispatches asset
//! loaders against it, and serializes or deserializes the result as a
//! fast-file. Ties together `chunk`, `layout`, `graph`, `scriptstring`,
//! `pool`, and `search_path` into one build/load pipeline per generation.

mod archive;
mod definition;
mod error;
mod generation;
mod loader;
mod manager;
mod zone;

pub use archive::ArchiveRepository;
pub use definition::{parse_definition, ZoneDefinition};
pub use error::ZoneError;
pub use generation::{Generation, GenerationProfile};
pub use loader::{AssetLoader, LoaderRegistry};
pub use manager::Manager;
pub use zone::{find_in_loaded_zones, BuildConfig, Zone};
