use matrix_types::config::MAX_QUALIFIED_TEAMS;
use matrix_types::{EngineError, Event, Phase, Team, TeamId};
use tracing::debug;

use crate::layer::Layer;
use crate::state::State;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_register_team(
        &mut self,
        name: &str,
    ) -> Result<Vec<Event>, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("team name must not be empty".into()));
        }
        let mut game = self.load_game().await?;
        if !matches!(game.phase, Phase::Registration | Phase::Round1) {
            return Err(EngineError::StateConflict(
                "registration is closed".into(),
            ));
        }
        let existing = self.load_teams(&game.registered_teams).await?;
        if existing.iter().any(|team| team.name == name) {
            return Err(EngineError::Validation(format!(
                "team name already taken: {name}"
            )));
        }

        let team = Team::new(name.to_string());
        let id = team.id;
        game.registered_teams.push(id);
        game.team_order.push(id);
        if game.active_team.is_none() {
            game.current_team_index = 0;
            game.active_team = Some(id);
        }
        // The first registration takes the lobby live.
        if game.phase == Phase::Registration {
            game.phase = Phase::Round1;
        }
        debug!(team = %id, name, "team registered");

        self.put_team(team);
        self.put_game(game);
        Ok(vec![Event::TeamRegistered {
            team: id,
            name: name.to_string(),
        }])
    }

    pub(in crate::layer) async fn handle_qualify_team(
        &mut self,
        id: TeamId,
    ) -> Result<Vec<Event>, EngineError> {
        let game = self.load_game().await?;
        if game.phase != Phase::Round1 {
            return Err(EngineError::StateConflict(
                "qualification only happens during round 1".into(),
            ));
        }
        let mut team = self.load_team(id).await?;
        if team.qualified {
            return Err(EngineError::Validation(format!(
                "team already qualified: {}",
                team.name
            )));
        }
        let qualified = self
            .load_teams(&game.registered_teams)
            .await?
            .iter()
            .filter(|team| team.qualified)
            .count();
        if qualified >= MAX_QUALIFIED_TEAMS {
            return Err(EngineError::Validation(format!(
                "round 2 is capped at {MAX_QUALIFIED_TEAMS} teams"
            )));
        }

        team.qualified = true;
        self.put_team(team);
        Ok(vec![Event::TeamQualified { team: id }])
    }
}
