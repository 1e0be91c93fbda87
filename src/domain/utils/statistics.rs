use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::scheduler::metrics::SimulationReport;
use crate::error::Result;

/// Column separator of every statistics file.
pub const DELIMITER: u8 = b';';

/// Writes one row per task, headers taken from the report field names.
pub fn write_task_csv(report: &SimulationReport, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_rows(report.tasks(), file)
}

/// Writes one row per leased VM.
pub fn write_vm_csv(report: &SimulationReport, path: impl AsRef<Path>) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_rows(report.vms.iter(), file)
}

pub fn write_rows<'a, T, W>(rows: impl IntoIterator<Item = &'a T>, writer: W) -> Result<()>
where
    T: Serialize + 'a,
    W: Write,
{
    let mut csv_wtr = csv::WriterBuilder::new().delimiter(DELIMITER).from_writer(writer);
    for row in rows {
        csv_wtr.serialize(row)?;
    }
    csv_wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scheduler::metrics::VmReport;

    #[test]
    fn test_rows_use_semicolon_and_camel_case_headers() {
        let rows = vec![VmReport {
            vm: "vm-1".to_string(),
            vm_type: "small".to_string(),
            processing_capacity: 1.0,
            lease_start_time: 0.0,
            lease_end_time: Some(40.0),
            lease_duration: 40.0,
            active_time: 30.0,
            idle_time: 10.0,
            cost: 0.5,
            energy: 30.0,
            tasks_executed: 2,
        }];

        let mut buffer = Vec::new();
        write_rows(rows.iter(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("vm;vmType;processingCapacity;leaseStartTime;leaseEndTime;leaseDuration;activeTime;idleTime;cost;energy;tasksExecuted")
        );
        assert_eq!(lines.next(), Some("vm-1;small;1.0;0.0;40.0;40.0;30.0;10.0;0.5;30.0;2"));
        assert_eq!(lines.next(), None);
    }
}
