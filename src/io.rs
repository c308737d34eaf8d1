use std::fs;
use std::path::Path;

use crate::constants::*;
use crate::page_table::Access;

/// Errors raised while reading a trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One request from the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Alloc { vpn: u32, access: Access },
    Free { vpn: u32 },
    Access { vpn: u32, access: Access },
    Switch { pid: u32 },
    Show,
    Counts,
    Check,
}

/// A command with the 1-based line it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLine {
    pub line: usize,
    pub command: Command,
}

pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceLine>, TraceError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_trace(&content)
}

pub fn parse_trace(content: &str) -> Result<Vec<TraceLine>, TraceError> {
    let mut commands = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let text = raw.split('#').next().unwrap_or_default();
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        let command = parse_command(&tokens).map_err(|message| TraceError::Parse { line, message })?;
        commands.push(TraceLine { line, command });
    }

    Ok(commands)
}

fn parse_command(tokens: &[&str]) -> Result<Command, String> {
    let args = &tokens[1..];
    let command = match tokens[0] {
        "alloc" | "a" => {
            expect_args(tokens[0], args, 2)?;
            Command::Alloc {
                vpn: parse_vpn(args[0])?,
                access: parse_access(args[1])?,
            }
        }
        "free" | "f" => {
            expect_args(tokens[0], args, 1)?;
            Command::Free { vpn: parse_vpn(args[0])? }
        }
        "read" | "r" => {
            expect_args(tokens[0], args, 1)?;
            Command::Access { vpn: parse_vpn(args[0])?, access: Access::Read }
        }
        "write" | "w" => {
            expect_args(tokens[0], args, 1)?;
            Command::Access { vpn: parse_vpn(args[0])?, access: Access::Write }
        }
        "switch" | "s" => {
            expect_args(tokens[0], args, 1)?;
            let pid = args[0].parse().map_err(|_| format!("Invalid pid: {}", args[0]))?;
            Command::Switch { pid }
        }
        "show" => {
            expect_args(tokens[0], args, 0)?;
            Command::Show
        }
        "counts" => {
            expect_args(tokens[0], args, 0)?;
            Command::Counts
        }
        "check" => {
            expect_args(tokens[0], args, 0)?;
            Command::Check
        }
        other => return Err(format!("Unknown command: {}", other)),
    };
    Ok(command)
}

fn expect_args(name: &str, args: &[&str], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!("{} takes {} argument(s), got {}", name, expected, args.len()));
    }
    Ok(())
}

fn parse_vpn(token: &str) -> Result<u32, String> {
    let vpn: u32 = token.parse().map_err(|_| format!("Invalid vpn: {}", token))?;
    if vpn as usize >= NR_VPNS {
        return Err(format!("VPN {} exceeds max {}", vpn, NR_VPNS - 1));
    }
    Ok(vpn)
}

fn parse_access(token: &str) -> Result<Access, String> {
    match token {
        "r" | "read" => Ok(Access::Read),
        "w" | "write" => Ok(Access::Write),
        _ => Err(format!("Invalid access mode: {} (expected r or w)", token)),
    }
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[i64]) -> Result<(), TraceError> {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    fs::write(path.as_ref(), output.join(" "))?;
    Ok(())
}
