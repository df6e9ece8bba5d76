// Prompt templates for resume analysis.
// Templates are plain constants with `{job_description}` substituted verbatim,
// so identical input always yields an identical prompt.

/// Full ATS analysis prompt. The resume itself travels as an attached file.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"You are an expert ATS (Applicant Tracking System) analyzer with deep hiring experience. Analyze this job description and the resume document I've provided.

=== JOB DESCRIPTION ===
{job_description}

=== YOUR TASK ===
Provide a comprehensive, intelligent ATS analysis with actionable insights. The resume is attached as a document file.

=== REQUIRED OUTPUT FORMAT ===
Return ONLY valid JSON (no markdown, no code blocks, no explanations) with this EXACT structure:

{
  "job_skills": {
    "technical_skills": ["skill1", "skill2"],
    "soft_skills": ["skill1", "skill2"],
    "certifications": ["cert1", "cert2"],
    "tools_technologies": ["tool1", "tool2"],
    "experience_requirements": {
      "years_required": <number or null>,
      "level": "entry|mid|senior|lead|executive"
    }
  },
  "resume_skills": {
    "technical_skills": ["skill1", "skill2"],
    "soft_skills": ["skill1", "skill2"],
    "certifications": ["cert1", "cert2"],
    "tools_technologies": ["tool1", "tool2"],
    "experience_years": <number>,
    "experience_level": "entry|mid|senior|lead|executive"
  },
  "matching_analysis": {
    "matched_technical_skills": ["skill1", "skill2"],
    "missing_technical_skills": ["skill1", "skill2"],
    "matched_soft_skills": ["skill1", "skill2"],
    "missing_soft_skills": ["skill1", "skill2"],
    "matched_tools": ["tool1", "tool2"],
    "missing_tools": ["tool1", "tool2"],
    "matched_certifications": ["cert1"],
    "missing_certifications": ["cert1"]
  },
  "scoring": {
    "ats_score": {
      "value": <0-100>,
      "formula": "Weighted average: (tech_skills * 0.40 + soft_skills * 0.15 + tools * 0.25 + certs * 0.10 + experience * 0.10)",
      "weights": {
        "technical_skills": 0.40,
        "soft_skills": 0.15,
        "tools_technologies": 0.25,
        "certifications": 0.10,
        "experience_match": 0.10
      },
      "component_scores": {
        "technical_skills_score": <0-100>,
        "soft_skills_score": <0-100>,
        "tools_score": <0-100>,
        "certifications_score": <0-100>,
        "experience_score": <0-100>
      }
    },
    "experience_match": {
      "value": <0-100>,
      "formula": "Comparison of years and level: exact match = 100, close = 80, below = 60, above = 70",
      "details": {
        "years_match_percentage": <0-100>,
        "level_match": "exact|close|below|above"
      }
    },
    "skill_proficiency": {
      "technical_proficiency": <0-100>,
      "soft_skills_proficiency": <0-100>,
      "formula": "Based on context depth and evidence in resume"
    }
  },
  "ai_insights": {
    "experience_gap_analysis": {
      "required_years": <number>,
      "candidate_years": <number>,
      "gap": <number (can be negative if exceeds)>,
      "insight": "Detailed explanation of the experience gap",
      "suggestions": ["Specific suggestion 1", "Specific suggestion 2"]
    },
    "critical_missing_skills": [
      {
        "skill": "skill_name",
        "importance": "why this skill matters for the role",
        "how_to_demonstrate": "actionable advice on showcasing this skill"
      }
    ]
  },
  "recommendations": {
    "skills_to_add": [
      {
        "skill": "skill_name",
        "category": "technical|soft_skill|tool|certification",
        "priority": "critical|high|medium|low",
        "impact": "5.2%",
        "suggested_experience_bullets": [
          "Suggested bullet point 1 incorporating this skill",
          "Suggested bullet point 2 for project section"
        ]
      }
    ],
    "resume_improvements": [
      "Suggestion 1",
      "Suggestion 2"
    ],
    "experience_section_improvements": [
      {
        "current_weakness": "Description of what's missing",
        "suggested_bullet": "Replacement or new bullet point to add",
        "skills_addressed": ["skill1", "skill2"]
      }
    ],
    "project_section_improvements": [
      {
        "missing_skill": "skill_name",
        "suggested_project_description": "A project description that demonstrates this skill"
      }
    ],
    "estimated_score_with_improvements": <0-100>
  }
}

RULES FOR INSIGHTS:
- Generate SPECIFIC experience gap insights (e.g., "JD requires 5 years but resume shows 1 year - consider highlighting leadership in your limited experience")
- For each missing skill, provide 2 CONCRETE bullet points that could be added to experience/project sections
- Make bullet points realistic and tailored to the candidate's background
- In experience_section_improvements, suggest SPECIFIC replacements or additions
- In project_section_improvements, create actual project descriptions that demonstrate missing skills
- Be actionable and specific, not generic

TECHNICAL RULES:
- Extract key skills, technologies, tools, and certifications (prioritize most relevant)
- Normalize skill names (JavaScript, javascript, JS → JavaScript)
- Consider synonyms and variations
- All scores must be 0-100 range
- Calculate the impact of each skill accurately for the what-if simulator
- Keep skill lists focused and relevant (max 15 per category)
- Output ONLY valid JSON with NO newlines inside string values
- Use single spaces instead of newlines in descriptions
- Ensure all strings are properly escaped and terminated
- Do NOT include markdown code blocks, explanations, or any text outside the JSON
- CRITICAL: Complete the entire JSON structure - do not truncate"#;

/// Lightweight skill extraction from the job description alone.
pub const JOB_SKILLS_PROMPT_TEMPLATE: &str = r#"Extract all skills, technologies, tools, and certifications from this job description.
Return ONLY a JSON array of strings, no other text.

JOB DESCRIPTION:
{job_description}

OUTPUT FORMAT (no markdown code blocks):
["skill1", "skill2", "skill3"]
"#;

const JOB_DESCRIPTION_SLOT: &str = "{job_description}";

pub fn build_analysis_prompt(job_description: &str) -> String {
    ANALYSIS_PROMPT_TEMPLATE.replace(JOB_DESCRIPTION_SLOT, job_description)
}

pub fn build_job_skills_prompt(job_description: &str) -> String {
    JOB_SKILLS_PROMPT_TEMPLATE.replace(JOB_DESCRIPTION_SLOT, job_description)
}
