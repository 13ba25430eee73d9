use serde::{Deserialize, Serialize};

/// One declared parameter of a skill, used to guide model extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self { name: name.into(), description: description.into(), required: false, default: None }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// An immutable capability descriptor. Instructions are free text handed
/// verbatim to the model on the generic execution path; skills with a
/// native handler are bound through the agent's handler registry instead
/// of carrying code here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub trigger_keywords: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
}

/// Loaded once at process start; reload is out of scope.
#[derive(Clone, Debug, Default)]
pub struct SkillRegistry {
    skills: Vec<Skill>,
}

/// Hyphen/underscore and case equivalence for model-returned skill names.
pub fn normalize_skill_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('_', "-")
}

impl SkillRegistry {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self { skills }
    }

    pub fn list(&self) -> &[Skill] {
        &self.skills
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Skill> {
        let wanted = normalize_skill_name(name);
        self.skills.iter().find(|skill| normalize_skill_name(&skill.name) == wanted)
    }
}

/// The built-in catalog. Descriptions and trigger keywords feed the intent
/// selector; parameter specs feed the extractor.
pub fn builtin_skills() -> Vec<Skill> {
    vec![
        Skill {
            name: "community-points".to_owned(),
            description: "Check point balances, earn points through tasks, book coworking days, \
                          redeem rewards, and (for admins) create tasks and award points."
                .to_owned(),
            instructions: POINTS_INSTRUCTIONS.to_owned(),
            trigger_keywords: [
                "points", "balance", "task", "tasks", "earn", "reward", "rewards", "coworking",
                "award", "claim", "redeem", "leaderboard",
            ]
            .map(str::to_owned)
            .to_vec(),
            parameters: vec![
                ParameterSpec::new("action", "What the user wants to do, e.g. balance, claim_task, award_points"),
                ParameterSpec::new("task_id", "Numeric ID of a task being claimed, submitted, approved or rejected"),
                ParameterSpec::new("target_user", "User the action applies to (for awards)"),
                ParameterSpec::new("points", "Explicit number of points, when stated"),
                ParameterSpec::new("reason", "Why points are being awarded"),
                ParameterSpec::new("title", "Title for a new task"),
                ParameterSpec::new("date", "A date in YYYY-MM-DD form, when stated"),
                ParameterSpec::new("reward_code", "Code of a reward being redeemed"),
            ],
        },
        Skill {
            name: "content-factory".to_owned(),
            description: "Generate SEO articles for the community site; long-running generation \
                          jobs with progress updates and a publish step."
                .to_owned(),
            instructions: CONTENT_INSTRUCTIONS.to_owned(),
            trigger_keywords: ["article", "blog", "seo", "content", "write a post"]
                .map(str::to_owned)
                .to_vec(),
            parameters: vec![
                ParameterSpec::new("topic", "Specific topic title for the article").required(),
                ParameterSpec::new("target_keyword", "Main keyword the article should target"),
                ParameterSpec::new("domain", "Site domain to publish under")
                    .default_value("mlai.au"),
            ],
        },
        Skill {
            name: "connect-users".to_owned(),
            description: "Find community members with particular expertise and introduce people."
                .to_owned(),
            instructions: CONNECT_INSTRUCTIONS.to_owned(),
            trigger_keywords: ["know anyone", "introduce", "expertise", "who works on"]
                .map(str::to_owned)
                .to_vec(),
            parameters: vec![
                ParameterSpec::new("query", "The expertise or topic to search for").required(),
                ParameterSpec::new("limit", "How many people to suggest").default_value("5"),
            ],
        },
    ]
}

const POINTS_INSTRUCTIONS: &str = "\
Help the member with the community points system. Members can check their \
balance and history, see open tasks and claim or submit them, check and book \
coworking days, and browse or request rewards. Admins can additionally create \
tasks, approve or reject submissions, and award points with a reason. Always \
confirm amounts before anything moves, and keep replies short and friendly.";

const CONTENT_INSTRUCTIONS: &str = "\
Kick off an article generation job for the requested topic. Generation takes \
several minutes; tell the user you'll post progress in the thread and share \
the preview and PR links once publishing finishes.";

const CONNECT_INSTRUCTIONS: &str = "\
Search the community expertise directory for people matching the query and \
suggest up to `limit` members worth talking to, with a one-line reason each. \
If nobody matches, say so and suggest posting in the relevant channel.";

#[cfg(test)]
mod tests {
    use super::{builtin_skills, normalize_skill_name, SkillRegistry};

    #[test]
    fn find_tolerates_case_and_separator_variants() {
        let registry = SkillRegistry::new(builtin_skills());
        assert!(registry.find("community_points").is_some());
        assert!(registry.find("Community-Points").is_some());
        assert!(registry.find("CONTENT_FACTORY").is_some());
        assert!(registry.find("no-such-skill").is_none());
    }

    #[test]
    fn normalization_collapses_underscores() {
        assert_eq!(normalize_skill_name(" Connect_Users "), "connect-users");
    }

    #[test]
    fn builtin_catalog_declares_required_parameters() {
        let registry = SkillRegistry::new(builtin_skills());
        let content = registry.find("content-factory").expect("content skill");
        let topic = content.parameters.iter().find(|p| p.name == "topic").expect("topic param");
        assert!(topic.required);
    }
}
