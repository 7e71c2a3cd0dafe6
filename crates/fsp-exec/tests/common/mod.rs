#![allow(dead_code)]

/// Formats a fixed-column PDB coordinate record.
pub fn pdb_record(record: &str, serial: u32, resname: &str, coords: [f64; 3], occ: f64, b: f64) -> String {
    format!(
        "{:<6}{:>5} {:<4}{:1}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}\n",
        record, serial, " C1", "", resname, "A", 1, "", coords[0], coords[1], coords[2], occ, b, "C"
    )
}

/// Occupancy field of a record, columns 55-60.
pub fn occupancy_field(line: &str) -> &str {
    &line[54..60]
}
