//! services/api/src/knowledge.rs
//!
//! The static Havana College knowledge corpus, loaded once at startup into
//! the core's `KnowledgeBase`. Content changes ship as code changes.

use admissions_chat_core::domain::KnowledgeEntry;

fn entry(id: &str, title: &str, keywords: &[&str], text: &str) -> KnowledgeEntry {
    KnowledgeEntry {
        id: id.to_string(),
        title: title.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        text: text.to_string(),
    }
}

/// Builds the full knowledge corpus. Order matters: retrieval ties are
/// broken by position in this list.
pub fn builtin_corpus() -> Vec<KnowledgeEntry> {
    vec![
        entry(
            "kb-tuition-fees",
            "Tuition Fees",
            &["tuition", "fees", "cost", "price", "payment"],
            "Undergraduate tuition at Havana College is 9,250 GBP per year for home students and \
             16,500 GBP per year for international students. Postgraduate taught programmes range \
             from 8,000 to 14,000 GBP per year. Fees can be paid in full at enrolment or in three \
             instalments across the academic year.",
        ),
        entry(
            "kb-admissions",
            "Admissions Requirements",
            &["admissions", "requirements", "apply", "application", "entry"],
            "Undergraduate applicants need three A-levels (typical offer BBB) or equivalent \
             qualifications such as a BTEC Extended Diploma (DDM). Applications are made through \
             UCAS by 31 January for September entry. Mature students without formal qualifications \
             may be considered after an interview.",
        ),
        entry(
            "kb-courses",
            "Courses and Programmes",
            &["courses", "programmes", "degrees", "subjects", "study"],
            "Havana College offers undergraduate degrees across Business, Computing, Design, \
             Health Sciences, and Humanities, plus a growing portfolio of postgraduate taught \
             programmes. Most degrees offer an optional placement year with industry partners in \
             London.",
        ),
        entry(
            "kb-scholarships",
            "Scholarships and Financial Support",
            &["scholarship", "scholarships", "bursary", "funding", "financial"],
            "Merit scholarships of up to 3,000 GBP per year are available to applicants with AAB \
             or above. The Access Bursary supports students from low-income households with 1,500 \
             GBP per year. Scholarship applications close on 30 June.",
        ),
        entry(
            "kb-accommodation",
            "Student Accommodation",
            &["accommodation", "housing", "halls", "residence", "rent"],
            "First-year students are guaranteed a room in college halls of residence if they apply \
             by 1 August. Halls are a 10-minute walk from campus; rents range from 160 to 230 GBP \
             per week including bills. The accommodation office also maintains a register of \
             approved private landlords.",
        ),
        entry(
            "kb-term-dates",
            "Term Dates",
            &["term", "dates", "semester", "calendar", "holidays"],
            "The academic year runs in two semesters: autumn semester from 23 September to 13 \
             December, and spring semester from 20 January to 23 May, with examination periods in \
             January and May.",
        ),
        entry(
            "kb-international",
            "International Students",
            &["international", "visa", "overseas", "english"],
            "International applicants need an IELTS score of 6.0 overall (no component below 5.5) \
             or an accepted equivalent. The college sponsors Student visas and the international \
             office runs a free airport pickup service during welcome week.",
        ),
        entry(
            "kb-contact",
            "Contacting the Admissions Office",
            &["contact", "phone", "email", "office", "speak"],
            "The admissions office is open Monday to Friday, 9:00 to 17:00, and can be reached at \
             admissions@havana.ac.uk or +44 20 7946 0123. Students can also book a one-to-one call \
             with an adviser through this chat.",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use admissions_chat_core::knowledge::{KnowledgeBase, DEFAULT_MAX_RESULTS};

    #[test]
    fn corpus_ids_are_unique() {
        let corpus = builtin_corpus();
        let mut ids: Vec<&str> = corpus.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), corpus.len());
    }

    #[test]
    fn tuition_question_retrieves_the_fees_entry() {
        let kb = KnowledgeBase::new(builtin_corpus());
        let results = kb.search(
            "What are the tuition fees for undergraduate programs?",
            DEFAULT_MAX_RESULTS,
        );
        assert_eq!(results[0].id, "kb-tuition-fees");
    }
}
