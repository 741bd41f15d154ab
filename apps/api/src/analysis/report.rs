//! Final report assembly for full-mode runs.

pub const REPORT_TITLE: &str = "# Resume-Job Description Match Analysis";
pub const MATCH_SUMMARY_HEADER: &str = "## Match Summary";
pub const RESUME_OVERVIEW_HEADER: &str = "## Resume Overview";
pub const JOB_REQUIREMENTS_HEADER: &str = "## Job Requirements Overview";
pub const RECOMMENDATIONS_HEADER: &str = "## Improvement Recommendations";
pub const REPORT_FOOTER: &str = "*Report generated by JDmatcher*";

/// Concatenates the four stage outputs under fixed headers, match summary first.
/// Stage text is inserted verbatim.
pub fn assemble_report(
    match_analysis: &str,
    resume_analysis: &str,
    jd_analysis: &str,
    improvement_suggestions: &str,
) -> String {
    format!(
        "{REPORT_TITLE}\n\n\
         {MATCH_SUMMARY_HEADER}\n{match_analysis}\n\n\
         {RESUME_OVERVIEW_HEADER}\n{resume_analysis}\n\n\
         {JOB_REQUIREMENTS_HEADER}\n{jd_analysis}\n\n\
         {RECOMMENDATIONS_HEADER}\n{improvement_suggestions}\n\n\
         {REPORT_FOOTER}\n"
    )
}
