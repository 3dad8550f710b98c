//! Text heuristics over OS network-configuration output.
//!
//! All parsers return an empty string when nothing usable is found.

use std::sync::OnceLock;
use regex::Regex;

/// Private LAN ranges we report. Excludes the overlay's 100.64/10 range and
/// the 172.16/12 range used by virtual adapters.
pub fn is_private_lan(addr: &str) -> bool {
    addr.starts_with("192.168.") || addr.starts_with("10.")
}

/// First non-empty line, used for `tailscale ip -4`
pub fn first_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn ipv4_field() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"IPv4 Address[.\s]*:\s*([0-9.]+)").expect("IPv4 field pattern"))
}

fn blank_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("blank line pattern"))
}

/// LAN address from Windows `ipconfig` output.
///
/// Prefers a private address on a Wi-Fi adapter, then the first private
/// IPv4 address anywhere in the output.
pub fn lan_from_ipconfig(output: &str) -> String {
    let wifi = adapter_sections(output)
        .into_iter()
        .filter(|section| section.contains("Wi-Fi") && section.contains("IPv4 Address"))
        .find_map(|section| {
            ipv4_field()
                .captures(&section)
                .map(|caps| caps[1].to_string())
                .filter(|addr| is_private_lan(addr))
        });
    if let Some(addr) = wifi {
        return addr;
    }

    ipv4_field()
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .find(|addr| is_private_lan(addr))
        .unwrap_or_default()
}

/// Splits `ipconfig` output into one section per adapter.
///
/// Blocks are separated by blank lines. ipconfig also puts a blank line
/// between an adapter's header ("Wireless LAN adapter Wi-Fi:") and its
/// fields, so a block that is only a header gets joined to the next one.
fn adapter_sections(output: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut pending_header: Option<&str> = None;

    for block in blank_line().split(output) {
        let block = block.trim_matches(|c: char| c == '\r' || c == '\n');
        if block.trim().is_empty() {
            continue;
        }
        if is_header_only(block) {
            if let Some(header) = pending_header.replace(block) {
                sections.push(header.to_string());
            }
            continue;
        }
        match pending_header.take() {
            Some(header) => sections.push(format!("{}\n{}", header, block)),
            None => sections.push(block.to_string()),
        }
    }
    if let Some(header) = pending_header {
        sections.push(header.to_string());
    }

    sections
}

fn is_header_only(block: &str) -> bool {
    let mut lines = block.lines().filter(|line| !line.trim().is_empty());
    match (lines.next(), lines.next()) {
        (Some(line), None) => {
            !line.starts_with(char::is_whitespace) && line.trim_end().ends_with(':')
        }
        _ => false,
    }
}

/// LAN address from Linux `ip -o -4 addr show` output.
///
/// One line per address: `2: wlp3s0    inet 192.168.1.23/24 brd ...`.
/// Prefers a private address on a wireless (`wl*`) interface, then the first
/// private address on any interface.
pub fn lan_from_ip_addr(output: &str) -> String {
    let addresses: Vec<(&str, &str)> = output.lines().filter_map(parse_ip_addr_line).collect();

    addresses
        .iter()
        .find(|(iface, addr)| iface.starts_with("wl") && is_private_lan(addr))
        .or_else(|| addresses.iter().find(|(_, addr)| is_private_lan(addr)))
        .map(|(_, addr)| addr.to_string())
        .unwrap_or_default()
}

fn parse_ip_addr_line(line: &str) -> Option<(&str, &str)> {
    let mut tokens = line.split_whitespace();
    tokens.next()?;
    let iface = tokens.next()?.trim_end_matches(':');
    let iface = iface.split('@').next().unwrap_or(iface);

    while let Some(token) = tokens.next() {
        if token == "inet" {
            let cidr = tokens.next()?;
            let addr = cidr.split('/').next()?;
            return Some((iface, addr));
        }
    }
    None
}
