// All LLM prompt constants for the analysis pipeline.
// Templates use `{placeholder}` markers filled by `fill_template` before sending.

/// Stage 1 system prompt: resume parsing.
pub const RESUME_PARSE_SYSTEM: &str = "You are an expert resume parser. \
    Extract key information from the resume including:
    - Technical skills and proficiencies
    - Work experience and duration
    - Education and qualifications
    - Projects and achievements
    - Certifications
    Provide the information in a structured format for easy analysis.";

/// Replace `{resume_text}` before sending.
pub const RESUME_PARSE_PROMPT_TEMPLATE: &str =
    "Parse this resume content and extract key information: {resume_text}";

/// Stage 2 system prompt: job description parsing.
pub const JD_PARSE_SYSTEM: &str = "You are an expert job description parser. \
    Extract key requirements from the job description including:
    - Required technical skills
    - Minimum experience needed
    - Educational requirements
    - Key responsibilities
    - Soft skills and other attributes
    Provide the information in a structured format for easy comparison.";

/// Replace `{jd_text}` before sending.
pub const JD_PARSE_PROMPT_TEMPLATE: &str =
    "Parse this job description and extract key requirements: {jd_text}";

/// Stage 3 system prompt: match analysis.
pub const MATCH_SYSTEM: &str = "You are an expert resume-job match analyzer. \
    Compare the resume with job description requirements to determine:
    - Overall match score (percentage)
    - Key matching skills and experiences
    - Missing skills or qualifications
    - Assessment of chances of selection
    Provide a detailed analysis with specific examples.";

/// Replace `{resume_analysis}` and `{jd_analysis}` before sending.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"Compare the following resume with the job description requirements:
Resume information: {resume_analysis}
Job requirements: {jd_analysis}

Provide a detailed match analysis including percentage match and specific matching/missing elements."#;

/// Stage 4 system prompt: improvement recommendations.
pub const IMPROVEMENT_SYSTEM: &str = "You are an expert career advisor. \
    Based on the gaps identified, provide actionable recommendations:
    - Specific skills to acquire or highlight
    - Resume improvements and restructuring suggestions
    - How to better position existing experience
    - Suggestions for addressing missing requirements
    - Interview preparation tips specific to this role
    Provide practical, specific advice that can be implemented.";

/// Replace `{resume_analysis}`, `{jd_analysis}` and `{match_analysis}` before sending.
pub const IMPROVEMENT_PROMPT_TEMPLATE: &str = r#"Based on the following analysis:
Resume information: {resume_analysis}
Job requirements: {jd_analysis}
Match analysis: {match_analysis}

Provide detailed recommendations for improving the match and preparing for the application/interview process."#;

/// Simplified mode system prompt: one call produces the whole report.
pub const COMBINED_SYSTEM: &str = "You are an expert resume analyst and career advisor. \
    You compare a candidate's resume with a job description and write a complete, \
    practical match report in a single response.";

/// Replace `{resume_text}` and `{jd_text}` before sending.
pub const COMBINED_PROMPT_TEMPLATE: &str = r#"Analyze the resume below against the job description and write a Markdown report with exactly these sections:

# Resume-Job Description Match Analysis

## Match Summary
State the overall match as a single percentage (for example "Overall match: 70%"), then list key matching skills and experiences and the missing skills or qualifications.

## Resume Overview
Technical skills, work experience, education, projects and certifications.

## Job Requirements Overview
Required skills, minimum experience, education, key responsibilities and soft skills.

## Improvement Recommendations
Skills to acquire or highlight, resume restructuring suggestions, how to address missing requirements, and interview preparation tips for this role.

RESUME:
{resume_text}

JOB DESCRIPTION:
{jd_text}"#;

/// Fills `{name}` markers in one left-to-right pass over `template`.
/// Inserted values are never rescanned, so text that happens to contain a
/// marker reaches the model unchanged. Unknown markers are left as-is.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let capacity = template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>();
    let mut out = String::with_capacity(capacity);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let filled = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match filled {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
