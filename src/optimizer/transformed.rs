//! Marks whether a pass actually changed the plan it was handed, so the
//! driver can fixed-point a pass that may need more than one application
//! (filter placement, reduce scans) without re-running passes that made no
//! progress. Ported from the teacher's `query_planner::transformed`.

pub enum Transformed<T> {
    Yes(T),
    No(T),
}

impl<T> Transformed<T> {
    pub fn get_plan(self) -> T {
        match self {
            Transformed::Yes(plan) | Transformed::No(plan) => plan,
        }
    }

    pub fn is_yes(&self) -> bool {
        matches!(self, Transformed::Yes(_))
    }
}
