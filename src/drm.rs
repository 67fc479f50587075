//! Native display modes from the kernel DRM class tree
//!
//! Layout under the root (normally /sys/class/drm):
//! `card<N>/card<N>-<connector>/modes`, one mode per line with the driver's
//! preferred (native) mode first. Cards and connectors come and go with
//! hotplug, so a vanished entry is skipped rather than reported.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::constants::paths;
use crate::types::DisplayInfo;

#[derive(Debug, Error)]
pub enum DrmError {
    #[error("{path} does not exist or is not a directory")]
    MissingRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot list graphics cards in {path}")]
    Listing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot enumerate displays of graphics card {card}")]
    Card {
        card: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read mode information for display {display}")]
    Modes {
        display: String,
        #[source]
        source: io::Error,
    },

    #[error("bug in parsing display ID '{0}'")]
    ConnectorName(String),
}

/// Handle on a DRM class directory
#[derive(Debug, Clone)]
pub struct DrmTree {
    root: PathBuf,
}

impl DrmTree {
    pub fn new() -> Self {
        Self::at(paths::DRM_ROOT)
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Names of all `card<N>` entries currently present
    pub fn cards(&self) -> Result<Vec<String>, DrmError> {
        let entries = fs::read_dir(&self.root).map_err(|source| DrmError::MissingRoot {
            path: self.root.clone(),
            source,
        })?;

        let mut cards: Vec<String> = Vec::new();
        for entry in entries {
            let card = subdir_named(entry, is_card_name).map_err(|source| DrmError::Listing {
                path: self.root.clone(),
                source,
            })?;
            cards.extend(card);
        }
        cards.sort();
        Ok(cards)
    }

    /// Connected displays of `cards` with their native mode
    ///
    /// `None` when no card has a connected display.
    pub fn displays(&self, cards: &[String]) -> Result<Option<Vec<DisplayInfo>>, DrmError> {
        let mut displays = Vec::new();

        for card in cards {
            let Some(connectors) = self.connectors(card)? else {
                debug!(card = %card, "Card disappeared during enumeration");
                continue;
            };

            for connector in connectors {
                let name = connector_name(&connector)?;
                match self.native_mode(card, &connector)? {
                    Some(mode) => displays.push(DisplayInfo::new(name, mode)),
                    None => debug!(connector = %connector, "Display not connected, skipping"),
                }
            }
        }

        if displays.is_empty() {
            return Ok(None);
        }
        Ok(Some(displays))
    }

    /// `None` if the card no longer exists
    fn connectors(&self, card: &str) -> Result<Option<Vec<String>>, DrmError> {
        let card_path = self.root.join(card);
        // No separate existence check, the read itself tells us if it's gone
        let entries = match fs::read_dir(&card_path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DrmError::Card {
                    card: card.to_string(),
                    source,
                });
            }
        };

        let mut connectors: Vec<String> = Vec::new();
        for entry in entries {
            let connector = subdir_named(entry, is_connector_name).map_err(|source| DrmError::Card {
                card: card.to_string(),
                source,
            })?;
            connectors.extend(connector);
        }
        connectors.sort();
        Ok(Some(connectors))
    }

    /// First line of the connector's mode list, `None` if vanished or disconnected
    fn native_mode(&self, card: &str, connector: &str) -> Result<Option<String>, DrmError> {
        let modes_path = self.root.join(card).join(connector).join("modes");
        let contents = match fs::read_to_string(&modes_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(DrmError::Modes {
                    display: connector.to_string(),
                    source,
                });
            }
        };

        Ok(contents
            .trim()
            .lines()
            .next()
            .filter(|line| !line.is_empty())
            .map(str::to_string))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for DrmTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Enumerate `cards`, or every card present when `cards` is `None`
pub fn hardware_displays(drm: &DrmTree, cards: Option<&[String]>) -> Result<Option<Vec<DisplayInfo>>> {
    let discovered;
    let cards = match cards {
        Some(cards) => cards,
        None => {
            discovered = drm.cards().context("Cannot discover graphics cards")?;
            &discovered
        }
    };
    Ok(drm.displays(cards)?)
}

/// Treat NotFound as "gone", pass every other error through
fn unless_vanished<T>(result: io::Result<T>) -> io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Name of a directory entry if `wanted` accepts it and it is a directory
///
/// Follows symlinks, the class tree links cards into /sys/devices.
fn subdir_named(
    entry: io::Result<fs::DirEntry>,
    wanted: fn(&str) -> bool,
) -> io::Result<Option<String>> {
    let Some(entry) = unless_vanished(entry)? else {
        return Ok(None);
    };
    let Ok(name) = entry.file_name().into_string() else {
        return Ok(None);
    };
    if !wanted(&name) {
        return Ok(None);
    }
    match unless_vanished(fs::metadata(entry.path()))? {
        Some(metadata) if metadata.is_dir() => Ok(Some(name)),
        _ => Ok(None),
    }
}

/// `card` followed by one or more digits
pub fn is_card_name(name: &str) -> bool {
    name.strip_prefix("card")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// `card<N>-<anything>`
fn is_connector_name(name: &str) -> bool {
    name.split_once('-').is_some_and(|(card, _)| is_card_name(card))
}

/// Connector part of `card<N>-<connector>`
fn connector_name(dir_name: &str) -> Result<&str, DrmError> {
    dir_name
        .split_once('-')
        .map(|(_, connector)| connector)
        .ok_or_else(|| DrmError::ConnectorName(dir_name.to_string()))
}
