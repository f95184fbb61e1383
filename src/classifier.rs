//! Cheap, network-free classification of incoming questions.
//!
//! Both checks are plain substring containment over the normalized
//! question. The identity probe list is broad and short probes may match
//! inside longer questions. The domain check only decides whether the
//! curated knowledge base is consulted.

use serde::Serialize;

use crate::config::ClassifierConfig;

/// Fixed self-description returned for every identity probe.
pub const IDENTITY_ANSWER: &str = "أنا SyriaGPT، مساعد ذكي متخصص في الإجابة عن الأسئلة المتعلقة بسوريا: \
مدنها وتاريخها وثقافتها واقتصادها ومؤسساتها الحكومية. طوّرتني وكالة نظم المعلومات السورية، \
وأستطيع كذلك مساعدتك في الأسئلة العامة. I am SyriaGPT, an assistant specialised in questions about Syria.";

const IDENTITY_PROBES: &[&str] = &[
    // who are you
    "من أنت",
    "من انت",
    "من هو أنت",
    "من هو انت",
    "عرف عن نفسك",
    "عرّف عن نفسك",
    "ما اسمك",
    "اسمك",
    "هويتك",
    // who made / trained / created you
    "من دربك",
    "من درّبك",
    "من علمك",
    "من صنعك",
    "من صانعك",
    "من مطورك",
    "من طورك",
    "من أنشأك",
    "من انشأك",
    "من برمجك",
    "من صممك",
    "من خلقك",
    "من بناك",
    "من قام بتدريبك",
    "من قام بتطويرك",
    "من قام بإنشائك",
    // what are you
    "ما أنت",
    "ماذا أنت",
    "ما نوعك",
    "ما طبيعتك",
    // what can you do
    "ماذا يمكنك أن تفعل",
    "ماذا يمكنك ان تفعل",
    "ما يمكنك فعله",
    "ماذا تستطيع",
    "ما تستطيع فعله",
    // purpose
    "ما هو هدفك",
    "ما هدفك",
    "ما هو دورك",
    "ما هي مهمتك",
    "who are you",
    "what are you",
    "who made you",
    "who created you",
    "who built you",
    "who trained you",
    "who developed you",
    "what can you do",
    "what is your name",
    "what's your name",
    "introduce yourself",
];

const DOMAIN_KEYWORDS: &[&str] = &[
    // country
    "سوريا",
    "سورية",
    "السوري",
    "syria",
    "syrian",
    "الشام",
    // cities and governorates
    "دمشق",
    "damascus",
    "حلب",
    "aleppo",
    "حمص",
    "homs",
    "حماة",
    "حماه",
    "اللاذقية",
    "latakia",
    "طرطوس",
    "tartus",
    "إدلب",
    "ادلب",
    "idlib",
    "درعا",
    "daraa",
    "السويداء",
    "القنيطرة",
    "دير الزور",
    "الرقة",
    "الحسكة",
    "القامشلي",
    "تدمر",
    "palmyra",
    "بصرى",
    "معلولا",
    // government
    "الحكومة",
    "الرئيس",
    "مجلس الشعب",
    "الدستور",
    "وزارة",
    "الوزير",
    "المحافظة",
    "المحافظات",
    "التحرير",
    // economy
    "الليرة",
    "الاقتصاد",
    "الصادرات",
    // culture
    "التراث",
    "المطبخ",
    "قاسيون",
    "الأموي",
];

/// Coarse category of a question, in routing precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryClass {
    Identity,
    Domain,
    General,
}

/// Lower-case and trim. The single normalization used by every tier.
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

pub struct QueryClassifier {
    identity_answer: String,
    identity_probes: Vec<String>,
    domain_keywords: Vec<String>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        Self {
            identity_answer: IDENTITY_ANSWER.to_string(),
            identity_probes: IDENTITY_PROBES.iter().map(|p| normalize_question(p)).collect(),
            domain_keywords: DOMAIN_KEYWORDS.iter().map(|k| normalize_question(k)).collect(),
        }
    }
}

impl QueryClassifier {
    /// Built-in lists extended with the configured additions.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut classifier = Self::default();
        if let Some(answer) = &config.identity_answer {
            if !answer.trim().is_empty() {
                classifier.identity_answer = answer.clone();
            }
        }
        classifier.identity_probes.extend(
            config
                .extra_identity_probes
                .iter()
                .map(|p| normalize_question(p))
                .filter(|p| !p.is_empty()),
        );
        classifier.domain_keywords.extend(
            config
                .extra_domain_keywords
                .iter()
                .map(|k| normalize_question(k))
                .filter(|k| !k.is_empty()),
        );
        classifier
    }

    /// Returns the self-description if the question contains any identity probe.
    pub fn identity_answer(&self, question: &str) -> Option<&str> {
        let q = normalize_question(question);
        let probe = self.identity_probes.iter().find(|p| q.contains(p.as_str()))?;
        tracing::debug!(probe = %probe, "identity probe matched");
        Some(&self.identity_answer)
    }

    /// True on the first domain keyword contained in the question.
    pub fn is_domain_question(&self, question: &str) -> bool {
        let q = normalize_question(question);
        self.domain_keywords.iter().any(|k| q.contains(k.as_str()))
    }

    pub fn classify(&self, question: &str) -> QueryClass {
        if self.identity_answer(question).is_some() {
            QueryClass::Identity
        } else if self.is_domain_question(question) {
            QueryClass::Domain
        } else {
            QueryClass::General
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_question("  Who Are You?  "), "who are you?");
    }

    #[test]
    fn test_identity_exact_probe() {
        let c = QueryClassifier::default();
        assert_eq!(c.identity_answer("من أنت"), Some(IDENTITY_ANSWER));
    }

    #[test]
    fn test_identity_is_substring_based() {
        let c = QueryClassifier::default();
        assert!(c.identity_answer("مرحبا، من أنت بالضبط؟").is_some());
        assert!(c.identity_answer("Hey, WHO MADE YOU anyway").is_some());
    }

    #[test]
    fn test_identity_beats_domain() {
        let c = QueryClassifier::default();
        let q = "من أنت وماذا تعرف عن سوريا";
        assert!(c.is_domain_question(q));
        assert_eq!(c.classify(q), QueryClass::Identity);
    }

    #[test]
    fn test_domain_keywords() {
        let c = QueryClassifier::default();
        assert!(c.is_domain_question("ما هي عاصمة سوريا"));
        assert!(c.is_domain_question("Tell me about Aleppo"));
        assert!(!c.is_domain_question("how do I bake bread"));
        assert_eq!(c.classify("مرحبا كيف حالك"), QueryClass::General);
    }

    #[test]
    fn test_config_extensions() {
        let cfg = ClassifierConfig {
            identity_answer: Some("I am a test bot.".to_string()),
            extra_identity_probes: vec!["Are You A Robot".to_string()],
            extra_domain_keywords: vec!["Euphrates".to_string()],
        };
        let c = QueryClassifier::from_config(&cfg);
        assert_eq!(c.identity_answer("are you a robot?"), Some("I am a test bot."));
        assert!(c.is_domain_question("how long is the euphrates"));
        // built-ins survive
        assert!(c.is_domain_question("damascus weather"));
    }
}
