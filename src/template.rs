//! Starter trees.
//!
//! Ids come from an [`IdSource`] so the same template can be applied more than
//! once without clashing with ids already on disk.

use crate::id::IdSource;
use crate::render::ShellType;
use crate::tree::{ConfigNode, NodeKind};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Root plus one injector with a PATH partial.
    Minimal,
    /// Root with env, aliases and prompt injectors, each with partials.
    Modular,
}

impl Template {
    pub const ALL: [Template; 2] = [Template::Minimal, Template::Modular];

    pub fn name(self) -> &'static str {
        match self {
            Template::Minimal => "minimal",
            Template::Modular => "modular",
        }
    }

    /// Build the template tree. Levels are left for the loader to compute.
    pub fn build(self, ids: &mut dyn IdSource, shell: ShellType) -> ConfigNode {
        let root_kind = shell.root_kind();
        let mut root = ConfigNode::new(
            ids.next_id(root_kind),
            root_kind,
            shell.default_root_file(),
            root_preamble(shell),
        );

        let injectors = match self {
            Template::Minimal => vec![injector(
                ids,
                "env",
                vec![("path", path_snippet(shell))],
            )],
            Template::Modular => vec![
                injector(
                    ids,
                    "env",
                    vec![("path", path_snippet(shell)), ("editor", editor_snippet(shell))],
                ),
                injector(
                    ids,
                    "aliases",
                    vec![
                        ("git", "alias gs='git status'\nalias gd='git diff'".to_string()),
                        ("ls", "alias ll='ls -lh'\nalias la='ls -A'".to_string()),
                    ],
                ),
                injector(ids, "prompt", vec![("prompt", prompt_snippet(shell))]),
            ],
        };
        root.children = injectors.into_iter().map(std::sync::Arc::new).collect();
        root
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown template {:?} (expected minimal or modular)", s))
    }
}

fn injector(ids: &mut dyn IdSource, title: &str, partials: Vec<(&str, String)>) -> ConfigNode {
    let id = ids.next_id(NodeKind::Injector);
    let children = partials
        .into_iter()
        .map(|(title, content)| {
            ConfigNode::new(ids.next_id(NodeKind::Partial), NodeKind::Partial, title, content)
        })
        .collect();
    ConfigNode::new(id, NodeKind::Injector, title, format!("# {}", title)).with_children(children)
}

fn root_preamble(shell: ShellType) -> String {
    match shell {
        ShellType::Zsh => "setopt autocd\nbindkey -e".to_string(),
        ShellType::Bash => "shopt -s histappend".to_string(),
        ShellType::Fish => "set -g fish_greeting".to_string(),
        ShellType::Sh => String::new(),
    }
}

fn path_snippet(shell: ShellType) -> String {
    match shell {
        ShellType::Fish => "fish_add_path $HOME/.local/bin".to_string(),
        _ => "export PATH=\"$HOME/.local/bin:$PATH\"".to_string(),
    }
}

fn editor_snippet(shell: ShellType) -> String {
    match shell {
        ShellType::Fish => "set -gx EDITOR vim".to_string(),
        _ => "export EDITOR=vim".to_string(),
    }
}

fn prompt_snippet(shell: ShellType) -> String {
    match shell {
        ShellType::Zsh => "PROMPT='%n@%m %1~ %# '".to_string(),
        ShellType::Bash => "PS1='\\u@\\h \\W \\$ '".to_string(),
        ShellType::Fish => "function fish_prompt\n    echo (prompt_pwd) '> '\nend".to_string(),
        ShellType::Sh => "PS1='$ '".to_string(),
    }
}
