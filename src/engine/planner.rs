//! Execution planner - service selection and ordering

use crate::service::ServiceName;

/// Parse a `--services` value into services, in dependency order.
///
/// `all` selects everything. Unknown names are logged and ignored.
pub fn parse_services(raw: &str) -> Vec<ServiceName> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return ServiceName::ALL.to_vec();
    }

    let mut selected: Vec<ServiceName> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<ServiceName>() {
            Ok(service) => Some(service),
            Err(_) => {
                log::warn!("Unknown service '{part}', ignoring");
                None
            }
        })
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

/// What happens to one requested service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Reconcile(ServiceName),
    Skip { service: ServiceName, reason: String },
}

impl Step {
    pub fn service(&self) -> ServiceName {
        match self {
            Self::Reconcile(service) | Self::Skip { service, .. } => *service,
        }
    }
}

/// Ordered steps for one run
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    steps: Vec<Step>,
}

impl ExecutionPlan {
    /// One step per requested service, in dependency order; services that
    /// failed their probe are skipped as unreachable
    pub fn build(requested: &[ServiceName], reachable: &[ServiceName]) -> Self {
        let steps = ServiceName::ALL
            .into_iter()
            .filter(|service| requested.contains(service))
            .map(|service| {
                if reachable.contains(&service) {
                    Step::Reconcile(service)
                } else {
                    Step::Skip {
                        service,
                        reason: "unreachable".to_string(),
                    }
                }
            })
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Services that will actually be reconciled
    pub fn reconcile_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Reconcile(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(parse_services("all"), ServiceName::ALL.to_vec());
        assert_eq!(parse_services(" ALL "), ServiceName::ALL.to_vec());
    }

    #[test]
    fn test_parse_orders_and_dedups() {
        assert_eq!(
            parse_services("jellyseerr, Sonarr,qbittorrent,sonarr"),
            vec![
                ServiceName::Qbittorrent,
                ServiceName::Sonarr,
                ServiceName::Jellyseerr
            ]
        );
    }

    #[test]
    fn test_parse_ignores_unknown_and_empty() {
        assert_eq!(parse_services("plex,,radarr2"), vec![ServiceName::Radarr2]);
        assert!(parse_services("").is_empty());
        assert!(parse_services("plex").is_empty());
    }

    #[test]
    fn test_plan_skips_unreachable() {
        let requested = [ServiceName::Jellyfin, ServiceName::Sonarr, ServiceName::Radarr];
        let reachable = [ServiceName::Sonarr, ServiceName::Jellyfin];
        let plan = ExecutionPlan::build(&requested, &reachable);

        assert_eq!(
            plan.steps(),
            &[
                Step::Reconcile(ServiceName::Sonarr),
                Step::Skip {
                    service: ServiceName::Radarr,
                    reason: "unreachable".to_string()
                },
                Step::Reconcile(ServiceName::Jellyfin),
            ]
        );
        assert_eq!(plan.reconcile_count(), 2);
        assert_eq!(plan.steps()[1].service(), ServiceName::Radarr);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ExecutionPlan::build(&[], &ServiceName::ALL);
        assert!(plan.steps().is_empty());
        assert_eq!(plan.reconcile_count(), 0);
    }
}
