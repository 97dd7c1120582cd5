//! Well-known ontology terms and the typing / labeling queries built on them.

use crate::error::ConfigError;

use super::index::KnowledgeGraph;
use super::namespace::Namespaces;
use super::{Term, TriplePattern};

/// Resolved IRIs of the predicates and classes the engine relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    /// `wdt:P31`.
    pub instance_of: Term,
    /// `rdfs:label`.
    pub label: Term,
    /// `wd:Q5`.
    pub human: Term,
    /// Classes whose instances count as movies.
    pub film_classes: Vec<Term>,
    /// `ddis:indirectSubclassOf`.
    pub indirect_subclass_of: Term,
}

impl Vocabulary {
    /// Expand the compact names from configuration.
    pub fn resolve(
        namespaces: &Namespaces,
        instance_of: &str,
        label: &str,
        human: &str,
        film_classes: &[String],
        indirect_subclass_of: &str,
    ) -> Result<Self, ConfigError> {
        let expand = |compact: &str| {
            namespaces
                .expand(compact)
                .map(Term::Iri)
                .ok_or_else(|| ConfigError::Invalid {
                    message: format!("ontology term `{compact}` does not use a known namespace prefix"),
                })
        };
        Ok(Self {
            instance_of: expand(instance_of)?,
            label: expand(label)?,
            human: expand(human)?,
            film_classes: film_classes
                .iter()
                .map(|c| expand(c))
                .collect::<Result<_, _>>()?,
            indirect_subclass_of: expand(indirect_subclass_of)?,
        })
    }

    /// Preferred label of an entity: an untagged or English literal first,
    /// then any literal, in sorted order.
    pub fn label_of(&self, graph: &KnowledgeGraph, entity: &Term) -> Option<String> {
        let labels = graph.objects_of(entity, &self.label);
        let preferred = labels.iter().find_map(|t| match t {
            Term::Literal(lit) if lit.language.as_deref().is_none_or(|l| l == "en") => {
                Some(lit.value.clone())
            }
            _ => None,
        });
        preferred.or_else(|| {
            labels
                .iter()
                .find(|t| t.is_literal())
                .map(|t| t.lexical().to_string())
        })
    }

    /// Whether `entity` is an instance of any film class.
    pub fn is_film(&self, graph: &KnowledgeGraph, entity: &Term) -> bool {
        self.film_classes
            .iter()
            .any(|class| self.is_instance(graph, entity, class))
    }

    /// Whether `entity` is an instance of the human class.
    pub fn is_human(&self, graph: &KnowledgeGraph, entity: &Term) -> bool {
        self.is_instance(graph, entity, &self.human)
    }

    fn is_instance(&self, graph: &KnowledgeGraph, entity: &Term, class: &Term) -> bool {
        !graph
            .matching(
                &TriplePattern::any()
                    .with_subject(entity.clone())
                    .with_predicate(self.instance_of.clone())
                    .with_object(class.clone()),
            )
            .is_empty()
    }

    /// All instances of any film class, sorted and deduplicated.
    pub fn films(&self, graph: &KnowledgeGraph) -> Vec<Term> {
        let mut films: Vec<Term> = self
            .film_classes
            .iter()
            .flat_map(|class| graph.subjects_of(&self.instance_of, class))
            .collect();
        films.sort();
        films.dedup();
        films
    }

    /// All instances of the human class, sorted.
    pub fn humans(&self, graph: &KnowledgeGraph) -> Vec<Term> {
        graph.subjects_of(&self.instance_of, &self.human)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Triple;
    use crate::graph::namespace::{RDFS, WD, WDT};

    fn vocab() -> Vocabulary {
        Vocabulary::resolve(
            &Namespaces::default(),
            "wdt:P31",
            "rdfs:label",
            "wd:Q5",
            &["wd:Q11424".to_string()],
            "ddis:indirectSubclassOf",
        )
        .unwrap()
    }

    fn wd(id: &str) -> Term {
        Term::iri(format!("{WD}{id}"))
    }

    #[test]
    fn types_and_labels() {
        let kg = KnowledgeGraph::new();
        let p31 = Term::iri(format!("{WDT}P31"));
        let label = Term::iri(format!("{RDFS}label"));
        kg.insert(&Triple::new(wd("M1"), p31.clone(), wd("Q11424"))).unwrap();
        kg.insert(&Triple::new(wd("P1"), p31, wd("Q5"))).unwrap();
        kg.insert(&Triple::new(wd("M1"), label.clone(), Term::lang_literal("Le Film", "fr")))
            .unwrap();
        kg.insert(&Triple::new(wd("M1"), label, Term::lang_literal("The Film", "en")))
            .unwrap();

        let v = vocab();
        assert!(v.is_film(&kg, &wd("M1")));
        assert!(!v.is_film(&kg, &wd("P1")));
        assert!(v.is_human(&kg, &wd("P1")));
        assert_eq!(v.label_of(&kg, &wd("M1")).as_deref(), Some("The Film"));
        assert_eq!(v.label_of(&kg, &wd("P1")), None);
        assert_eq!(v.films(&kg), vec![wd("M1")]);
        assert_eq!(v.humans(&kg), vec![wd("P1")]);
    }

    #[test]
    fn unknown_prefix_is_config_error() {
        let err = Vocabulary::resolve(
            &Namespaces::default(),
            "zz:P31",
            "rdfs:label",
            "wd:Q5",
            &[],
            "ddis:indirectSubclassOf",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
