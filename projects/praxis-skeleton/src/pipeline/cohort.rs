use crate::pipeline::selector::select_frames;
use crate::pipeline::types::{Cohort, Warning, WarningLog};
use crate::run_context::DatasetLayout;

/// Run the frame selector for every patient directory under the root.
///
/// Every patient appears in the result, including those that produced no
/// frames, so the report shows why a patient contributed nothing. A patient
/// whose annotation interval is malformed is logged and mapped to an empty list.
pub fn collect_cohort(layout: &DatasetLayout, action_id: &str, warnings: &mut WarningLog) -> Cohort {
    let patients = layout.list_patients();
    tracing::info!(
        "Found {} patient directories under {:?}",
        patients.len(),
        layout.root_dir
    );

    let mut cohort = Cohort::new();
    for patient_id in patients {
        let frames = match select_frames(layout, &patient_id, action_id, warnings) {
            Ok(frames) => frames,
            Err(e) => {
                warnings.push(Warning::MalformedAnnotation {
                    patient_id: patient_id.clone(),
                    message: e.to_string(),
                });
                Vec::new()
            }
        };
        cohort.insert(patient_id, frames);
    }
    cohort
}
