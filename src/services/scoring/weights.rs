//! Capability-driven weight derivation (spec.md §4.1 "Weight derivation").

#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub engagement: f64,
    pub semantic: f64,
    pub session: f64,
    pub time_pref: f64,
    pub freshness: f64,
    pub exploration: f64,
}

impl Weights {
    fn base() -> Self {
        Weights {
            engagement: 0.30,
            semantic: 0.25,
            session: 0.20,
            time_pref: 0.10,
            freshness: 0.10,
            exploration: 0.05,
        }
    }

    fn sum(&self) -> f64 {
        self.engagement + self.semantic + self.session + self.time_pref + self.freshness + self.exploration
    }

    fn normalize(self) -> Self {
        let total = self.sum();
        if total <= 0.0 {
            return Weights::base();
        }
        Weights {
            engagement: self.engagement / total,
            semantic: self.semantic / total,
            session: self.session / total,
            time_pref: self.time_pref / total,
            freshness: self.freshness / total,
            exploration: self.exploration / total,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub has_embeddings: bool,
    pub has_usable_time_prefs: bool,
    pub cards_shown: i64,
}

pub fn derive(caps: &Capabilities) -> Weights {
    let mut w = Weights::base();

    if !caps.has_embeddings {
        w.semantic = 0.0;
        w.engagement += 0.11;
        w.session += 0.08;
        w.exploration += 0.06;
    }

    if !caps.has_usable_time_prefs {
        w.time_pref = 0.0;
        w.engagement += 0.05;
        w.freshness += 0.05;
    }

    if caps.cards_shown == 0 {
        let redistributed = w.session;
        w.session = 0.0;
        w.freshness += redistributed * 0.6;
        w.exploration += redistributed * 0.4;
    }

    if caps.cards_shown > 24 {
        let moved = w.exploration * 0.5;
        w.exploration -= moved;
        w.engagement += moved * 0.6;
        w.session += moved * 0.4;
    }

    w.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sums_to_one(w: &Weights) {
        let total = w.engagement + w.semantic + w.session + w.time_pref + w.freshness + w.exploration;
        assert!((total - 1.0).abs() < 1e-9, "weights summed to {total}");
        assert!(w.engagement >= 0.0);
        assert!(w.semantic >= 0.0);
        assert!(w.session >= 0.0);
        assert!(w.time_pref >= 0.0);
        assert!(w.freshness >= 0.0);
        assert!(w.exploration >= 0.0);
    }

    #[test]
    fn base_case_sums_to_one() {
        let w = derive(&Capabilities {
            has_embeddings: true,
            has_usable_time_prefs: true,
            cards_shown: 5,
        });
        assert_sums_to_one(&w);
    }

    #[test]
    fn no_signals_available_still_sums_to_one() {
        let w = derive(&Capabilities {
            has_embeddings: false,
            has_usable_time_prefs: false,
            cards_shown: 0,
        });
        assert_sums_to_one(&w);
        assert_eq!(w.semantic, 0.0);
        assert_eq!(w.time_pref, 0.0);
        assert_eq!(w.session, 0.0);
    }

    #[test]
    fn heavy_session_redistributes_exploration() {
        let w = derive(&Capabilities {
            has_embeddings: true,
            has_usable_time_prefs: true,
            cards_shown: 30,
        });
        assert_sums_to_one(&w);
    }
}
