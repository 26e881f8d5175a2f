use survey_core::config::SurveyConfig;
use survey_core::types::{QuestionDefinition, TemplateRef};
use survey_core::{SurveyError, SurveyResult};

/// Question 1 is the first-contact template; the catalog starts after it.
pub const FIRST_CATALOG_QUESTION: u32 = 2;

/// Validated, ordered set of questions 2..=N plus the closing message.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    questions: Vec<QuestionDefinition>,
    closing_message: String,
    template: TemplateRef,
}

impl QuestionCatalog {
    /// Build a catalog. Questions may be given in any order but must form
    /// the contiguous range `2..=N`.
    pub fn new(
        mut questions: Vec<QuestionDefinition>,
        closing_message: impl Into<String>,
        template: TemplateRef,
    ) -> SurveyResult<Self> {
        let closing_message = closing_message.into();
        if questions.is_empty() {
            return Err(SurveyError::Catalog(
                "catalog must define at least one question".to_string(),
            ));
        }
        if closing_message.trim().is_empty() {
            return Err(SurveyError::Catalog(
                "closing message must not be empty".to_string(),
            ));
        }

        questions.sort_by_key(|q| q.number);
        for (expected, question) in (FIRST_CATALOG_QUESTION..).zip(&questions) {
            if question.number != expected {
                return Err(SurveyError::Catalog(format!(
                    "expected question {expected}, found question {}",
                    question.number
                )));
            }
            if question.prompt.trim().is_empty() {
                return Err(SurveyError::Catalog(format!(
                    "question {} has an empty prompt",
                    question.number
                )));
            }
            for (i, option) in question.options.iter().enumerate() {
                if option.id.is_empty() || option.title.is_empty() {
                    return Err(SurveyError::Catalog(format!(
                        "question {} has an option with an empty id or title",
                        question.number
                    )));
                }
                if question.options[..i].iter().any(|o| o.id == option.id) {
                    return Err(SurveyError::Catalog(format!(
                        "question {} repeats option id `{}`",
                        question.number, option.id
                    )));
                }
            }
        }

        Ok(Self {
            questions,
            closing_message,
            template,
        })
    }

    pub fn from_config(config: &SurveyConfig) -> SurveyResult<Self> {
        Self::new(
            config.questions.clone(),
            config.closing_message.clone(),
            config.template.clone(),
        )
    }

    pub fn get(&self, number: u32) -> Option<&QuestionDefinition> {
        let index = number.checked_sub(FIRST_CATALOG_QUESTION)? as usize;
        self.questions.get(index)
    }

    /// Number of the final question (`N`).
    pub fn last_question(&self) -> u32 {
        FIRST_CATALOG_QUESTION + self.questions.len() as u32 - 1
    }

    pub fn questions(&self) -> &[QuestionDefinition] {
        &self.questions
    }

    pub fn closing_message(&self) -> &str {
        &self.closing_message
    }

    pub fn template(&self) -> &TemplateRef {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_core::types::ChoiceOption;

    fn question(number: u32, options: &[&str]) -> QuestionDefinition {
        QuestionDefinition {
            number,
            prompt: format!("Question {number}"),
            options: options
                .iter()
                .map(|id| ChoiceOption {
                    id: id.to_string(),
                    title: id.to_uppercase(),
                })
                .collect(),
        }
    }

    fn template() -> TemplateRef {
        TemplateRef {
            name: "survey_intro".to_string(),
            language: "en_US".to_string(),
        }
    }

    #[test]
    fn test_lookup_and_bounds() {
        let catalog = QuestionCatalog::new(
            vec![question(3, &[]), question(2, &["a", "b"]), question(4, &["x"])],
            "Thanks!",
            template(),
        )
        .unwrap();

        assert_eq!(catalog.last_question(), 4);
        assert!(catalog.get(0).is_none());
        assert!(catalog.get(1).is_none());
        assert_eq!(catalog.get(2).unwrap().options.len(), 2);
        assert!(catalog.get(3).unwrap().is_free_text());
        assert_eq!(catalog.get(4).unwrap().number, 4);
        assert!(catalog.get(5).is_none());
        assert_eq!(catalog.closing_message(), "Thanks!");
    }

    #[test]
    fn test_rejects_empty_catalog() {
        assert!(matches!(
            QuestionCatalog::new(vec![], "Thanks!", template()),
            Err(SurveyError::Catalog(_))
        ));
    }

    #[test]
    fn test_rejects_gaps_duplicates_and_wrong_start() {
        let gap = QuestionCatalog::new(vec![question(2, &[]), question(4, &[])], "x", template());
        assert!(gap.is_err());

        let duplicate =
            QuestionCatalog::new(vec![question(2, &[]), question(2, &[])], "x", template());
        assert!(duplicate.is_err());

        let starts_at_one = QuestionCatalog::new(vec![question(1, &[])], "x", template());
        assert!(starts_at_one.is_err());
    }

    #[test]
    fn test_rejects_repeated_option_ids() {
        let result = QuestionCatalog::new(vec![question(2, &["a", "a"])], "x", template());
        assert!(matches!(result, Err(SurveyError::Catalog(msg)) if msg.contains("`a`")));
    }

    #[test]
    fn test_rejects_blank_closing_message() {
        assert!(QuestionCatalog::new(vec![question(2, &[])], "  ", template()).is_err());
    }
}
