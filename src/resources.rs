use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Accept and reject phrases for one language
#[derive(Debug, Clone)]
pub struct PhraseSet {
    /// Phrases that label accept-style buttons
    pub allow: Vec<String>,
    /// Phrases that label reject-style buttons
    pub reject: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CmpEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CmpList {
    cmps: HashMap<String, CmpEntry>,
}

/// Static crawl inputs loaded from the resource directory.
///
/// The directory layout mirrors the measurement inputs: per-language phrase
/// files `consent_<lang>.txt` / `reject_<lang>.txt`, the IAB CMP vendor list
/// snapshot `cmplist.json`, and the cookie-dialog marker lists.
pub struct Resources {
    dir: PathBuf,
}

impl Resources {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("Resource directory not found: {}", dir.display());
        }
        Ok(Resources {
            dir: dir.to_path_buf(),
        })
    }

    /// Load the accept and reject phrase files for one language.
    ///
    /// A missing file is an error: the language list is caller-controlled and
    /// silently skipping a language would change detection rates.
    pub fn phrase_set(&self, lang: &str) -> Result<PhraseSet> {
        let allow = self.read_lines(&format!("consent_{}.txt", lang))?;
        let reject = self.read_lines(&format!("reject_{}.txt", lang))?;
        Ok(PhraseSet { allow, reject })
    }

    /// Element ids known to carry cookie dialogs, lowercase
    pub fn dialog_ids(&self) -> Result<Vec<String>> {
        self.read_lines("cookie_dialog_ids.txt")
    }

    /// Class attribute values known to carry cookie dialogs, lowercase
    pub fn dialog_classes(&self) -> Result<Vec<String>> {
        self.read_lines("cookie_dialog_classes.txt")
    }

    /// Resolve a CMP vendor id against the bundled CMP list snapshot.
    ///
    /// Unknown ids resolve to an empty name; only a missing or malformed list
    /// file is an error.
    pub fn cmp_name(&self, cmp_id: i64) -> Result<String> {
        let path = self.dir.join("cmplist.json");
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cmplist: {}", path.display()))?;
        let list: CmpList = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed cmplist: {}", path.display()))?;

        for (key, entry) in &list.cmps {
            if key.parse::<i64>().map(|id| id == cmp_id).unwrap_or(false) {
                return Ok(entry.name.clone());
            }
        }
        Ok(String::new())
    }

    fn read_lines(&self, name: &str) -> Result<Vec<String>> {
        let path = self.dir.join(name);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read phrase file: {}", path.display()))?;
        Ok(raw
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Load the site list: one site per line, comma-separated fields, the site in
/// the second field. Entries already naming a "www" host get a plain scheme
/// prefix; all others get "www." prepended as well.
pub fn load_site_list(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read site list: {}", path.display()))?;

    let mut sites = Vec::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let site = fields
            .nth(1)
            .with_context(|| format!("site list line {} has no second field", lineno + 1))?;
        if site.contains("www") {
            sites.push(format!("http://{}", site));
        } else {
            sites.push(format!("http://www.{}", site));
        }
    }
    Ok(sites)
}

#[cfg(test)]
#[path = "resources_test.rs"]
mod resources_test;
