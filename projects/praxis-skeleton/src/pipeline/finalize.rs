use crate::pipeline::types::LandmarkRow;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write the header and all rows as CSV.
pub fn write_rows<W: Write>(writer: W, rows: &[LandmarkRow]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(LandmarkRow::header())?;
    for row in rows {
        csv_writer.write_record(row.to_record())?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Persist the landmark table, creating the parent directory if needed.
pub fn save_table(path: &Path, rows: &[LandmarkRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }

    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create output table {:?}", path))?;
    write_rows(file, rows)?;

    tracing::info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::LANDMARKS_OF_INTEREST;

    fn row(patient_id: &str) -> LandmarkRow {
        let mut joints = [(0.0, 0.0); LANDMARKS_OF_INTEREST.len()];
        joints[0] = (0.12346, 0.5);
        joints[15] = (-0.0, -0.0);
        joints[16] = (1.0, 0.00001);
        LandmarkRow {
            patient_id: patient_id.to_string(),
            action_id: "P2_3".to_string(),
            start_frame: 817000,
            end_frame: 150000,
            joints,
        }
    }

    #[test]
    fn test_write_rows() {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &[row("Patient_01")]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("patient_id,action,start_frame,end_frame,joint_0_x,joint_0_y,joint_7_x"));
        assert!(lines[1].starts_with("Patient_01,P2_3,817000,150000,0.12346,0.50000,0.00000,0.00000"));
        assert!(lines[1].ends_with(",1.00000,0.00001"));
        assert!(!text.contains("-0.00000"));
    }

    #[test]
    fn test_empty_table_has_header() {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &[]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_save_table_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/P2_3_skeleton.csv");
        save_table(&path, &[row("Patient_01"), row("Patient_02")]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
