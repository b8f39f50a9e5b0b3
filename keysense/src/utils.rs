use std::ops::RangeBounds;

pub trait WithinExt {
    fn within(&self, range: impl RangeBounds<Self>) -> bool;
}

impl <T: PartialOrd<T>> WithinExt for T {
    fn within(&self, range: impl RangeBounds<Self>) -> bool {
        range.contains(&self)
    }
}

/// Splits a list of line ids separated by commas, spaces or semicolons.
pub fn parse_line_list(list: &str) -> eyre::Result<Vec<u32>> {
    let lines = list
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?;
    if lines.is_empty() {
        eyre::bail!("No lines given in {:?}", list);
    }
    Ok(lines)
}
