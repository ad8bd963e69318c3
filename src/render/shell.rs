use crate::id::NodeId;
use crate::tree::{ConfigNode, NodeKind};
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Target shell; decides file extensions and how fragments are sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellType {
    #[default]
    Zsh,
    Bash,
    Fish,
    Sh,
}

impl ShellType {
    pub fn extension(self) -> &'static str {
        match self {
            ShellType::Zsh => "zsh",
            ShellType::Bash => "bash",
            ShellType::Fish => "fish",
            ShellType::Sh => "sh",
        }
    }

    pub fn source_keyword(self) -> &'static str {
        match self {
            ShellType::Sh => ".",
            _ => "source",
        }
    }

    /// Startup file used when the root node has no usable title.
    pub fn default_root_file(self) -> &'static str {
        match self {
            ShellType::Zsh => ".zshrc",
            ShellType::Bash => ".bashrc",
            ShellType::Fish => "config.fish",
            ShellType::Sh => ".profile",
        }
    }

    pub fn root_kind(self) -> NodeKind {
        match self {
            ShellType::Zsh => NodeKind::Zsh,
            ShellType::Bash => NodeKind::Bash,
            ShellType::Fish => NodeKind::Fish,
            ShellType::Sh => NodeKind::Main,
        }
    }

    /// The shell a root kind pins, if any. Plain `main` pins none.
    pub fn from_root_kind(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Zsh => Some(ShellType::Zsh),
            NodeKind::Bash => Some(ShellType::Bash),
            NodeKind::Fish => Some(ShellType::Fish),
            _ => None,
        }
    }
}

impl fmt::Display for ShellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ShellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zsh" => Ok(ShellType::Zsh),
            "bash" => Ok(ShellType::Bash),
            "fish" => Ok(ShellType::Fish),
            "sh" | "posix" => Ok(ShellType::Sh),
            other => Err(format!("unknown shell {:?} (expected zsh, bash, fish or sh)", other)),
        }
    }
}

/// One generated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub node_id: NodeId,
    /// Destination path, possibly containing `$HOME`.
    pub path: String,
    pub body: String,
    pub is_root: bool,
}

/// File name for a fragment titled `title`.
///
/// Known shell extensions are stripped, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, leading dots are dropped, and the shell's extension is added.
pub fn script_file_name(title: &str, shell: ShellType) -> anyhow::Result<String> {
    let re = Regex::new(r"[^A-Za-z0-9._-]+")?;
    let ext = Regex::new(r"\.(zsh|bash|fish|sh)$")?;

    let stem = ext.replace(title.trim(), "");
    let stem = re.replace_all(&stem, "_");
    let stem = stem.trim_start_matches('.');
    let stem = if stem.is_empty() { "fragment" } else { stem };
    Ok(format!("{}.{}", stem, shell.extension()))
}

/// Render every node to a script, depth-first, root first.
///
/// A node with children ends with one source line per child, in child order.
/// Duplicate file names get `-2`, `-3`, ... before the extension.
pub fn render_files(
    root: &ConfigNode,
    shell: ShellType,
    config_dir: &str,
) -> anyhow::Result<Vec<RenderedFile>> {
    let config_dir = config_dir.trim_end_matches('/');

    let mut names: BTreeMap<NodeId, String> = BTreeMap::new();
    let mut taken: BTreeSet<String> = BTreeSet::new();
    assign_names(root, shell, true, &mut names, &mut taken)
        .context("assign script file names")?;

    let root_file = match root.title.trim() {
        "" => shell.default_root_file().to_string(),
        t => Regex::new(r"[^A-Za-z0-9._-]+")?
            .replace_all(t, "_")
            .into_owned(),
    };

    let mut out = Vec::new();
    emit(root, shell, config_dir, &root_file, &names, &mut out);
    Ok(out)
}

fn assign_names(
    node: &ConfigNode,
    shell: ShellType,
    is_root: bool,
    names: &mut BTreeMap<NodeId, String>,
    taken: &mut BTreeSet<String>,
) -> anyhow::Result<()> {
    if !is_root {
        let base = script_file_name(&node.title, shell)?;
        let stem = base.trim_end_matches(&format!(".{}", shell.extension()));
        let mut name = base.clone();
        let mut n = 1;
        // A suffixed name can itself be a title elsewhere in the tree.
        while taken.contains(&name) {
            n += 1;
            name = format!("{}-{}.{}", stem, n, shell.extension());
        }
        taken.insert(name.clone());
        names.insert(node.id.clone(), name);
    }
    for child in &node.children {
        assign_names(child, shell, false, names, taken)?;
    }
    Ok(())
}

fn emit(
    node: &ConfigNode,
    shell: ShellType,
    config_dir: &str,
    root_file: &str,
    names: &BTreeMap<NodeId, String>,
    out: &mut Vec<RenderedFile>,
) {
    let is_root = node.kind.is_root();
    let path = match names.get(&node.id) {
        Some(name) if !is_root => format!("{}/{}", config_dir, name),
        _ => format!("$HOME/{}", root_file),
    };

    let mut body = format!("# {} [{}]\n", node.title, node.kind);
    let content = node.content.trim_end();
    if !content.is_empty() {
        body.push_str(content);
        body.push('\n');
    }
    if !node.children.is_empty() {
        body.push('\n');
        for child in &node.children {
            if let Some(name) = names.get(&child.id) {
                body.push_str(&format!(
                    "{} \"{}/{}\"\n",
                    shell.source_keyword(),
                    config_dir,
                    name
                ));
            }
        }
    }

    out.push(RenderedFile {
        node_id: node.id.clone(),
        path,
        body,
        is_root,
    });
    for child in &node.children {
        emit(child, shell, config_dir, root_file, names, out);
    }
}

/// A POSIX installer script: one heredoc write per fragment, root last.
pub fn render_installer(
    root: &ConfigNode,
    shell: ShellType,
    config_dir: &str,
) -> anyhow::Result<String> {
    let files = render_files(root, shell, config_dir)?;

    const TEMPLATE: &str = r#"#!/bin/sh
# Generated by rcgraph: __COUNT__ files for __SHELL__.
set -e
mkdir -p "__CONFIG_DIR__"

__BLOCKS__"#;

    let (roots, fragments): (Vec<_>, Vec<_>) = files.iter().partition(|f| f.is_root);
    let mut blocks = String::new();
    for file in fragments.into_iter().chain(roots) {
        let delim = heredoc_delimiter(&file.body);
        blocks.push_str(&format!(
            "cat > \"{}\" <<'{}'\n{}{}\n\n",
            file.path, delim, file.body, delim
        ));
    }

    Ok(TEMPLATE
        .replace("__COUNT__", &files.len().to_string())
        .replace("__SHELL__", shell.extension())
        .replace("__CONFIG_DIR__", config_dir.trim_end_matches('/'))
        .replace("__BLOCKS__", blocks.trim_end())
        + "\n")
}

fn heredoc_delimiter(body: &str) -> String {
    let mut delim = "RCGRAPH_EOF".to_string();
    let mut n = 0;
    while body.lines().any(|l| l == delim) {
        n += 1;
        delim = format!("RCGRAPH_EOF_{}", n);
    }
    delim
}
