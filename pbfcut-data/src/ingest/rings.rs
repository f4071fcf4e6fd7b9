//! Ring assembly for multipolygon and boundary relations.
use geo::{Contains, Coord, Intersects, LineString, MultiPolygon, Polygon};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RingRole {
    Outer,
    Inner,
}

/// Join member ways into rings and attach each inner ring to the outer ring
/// that holds it. Returns `None` when no closed outer ring can be formed.
pub(super) fn assemble_area(
    relation: i64,
    parts: Vec<(Vec<Coord<f64>>, RingRole)>,
) -> Option<MultiPolygon<f64>> {
    let (outer_parts, inner_parts): (Vec<_>, Vec<_>) =
        parts.into_iter().partition(|(_, role)| *role == RingRole::Outer);
    let outers = join_rings(relation, outer_parts.into_iter().map(|(coords, _)| coords));
    let inners = join_rings(relation, inner_parts.into_iter().map(|(coords, _)| coords));
    if outers.is_empty() {
        warn!("Skipped relation {relation}: no closed outer ring");
        return None;
    }

    let shells: Vec<Polygon<f64>> = outers
        .into_iter()
        .map(|ring| Polygon::new(ring, Vec::new()))
        .collect();
    let mut holes: Vec<Vec<LineString<f64>>> = vec![Vec::new(); shells.len()];
    for inner in inners {
        let host = shells
            .iter()
            .position(|shell| shell.contains(&inner))
            .or_else(|| shells.iter().position(|shell| shell.intersects(&inner)));
        match host.and_then(|index| holes.get_mut(index)) {
            Some(slot) => slot.push(inner),
            None => warn!("Relation {relation}: inner ring lies outside every outer ring"),
        }
    }

    Some(MultiPolygon(
        shells
            .into_iter()
            .zip(holes)
            .map(|(shell, interiors)| {
                let (exterior, _) = shell.into_inner();
                Polygon::new(exterior, interiors)
            })
            .collect(),
    ))
}

/// Chain coordinate runs end to end until each closes on itself.
fn join_rings<I>(relation: i64, parts: I) -> Vec<LineString<f64>>
where
    I: IntoIterator<Item = Vec<Coord<f64>>>,
{
    let mut remaining: Vec<Vec<Coord<f64>>> =
        parts.into_iter().filter(|part| part.len() >= 2).collect();
    remaining.reverse();
    let mut rings = Vec::new();
    while let Some(mut ring) = remaining.pop() {
        loop {
            if ring.len() > 1 && ring.first() == ring.last() {
                if ring.len() >= 4 {
                    rings.push(LineString::from(ring));
                } else {
                    warn!("Relation {relation}: dropped a degenerate ring");
                }
                break;
            }
            let Some(tail) = ring.last().copied() else {
                break;
            };
            let next = remaining
                .iter()
                .position(|part| part.first() == Some(&tail) || part.last() == Some(&tail));
            let Some(index) = next else {
                warn!("Relation {relation}: dropped a ring that does not close");
                break;
            };
            let mut part = remaining.swap_remove(index);
            if part.first() != Some(&tail) {
                part.reverse();
            }
            ring.extend(part.into_iter().skip(1));
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn run(points: &[(f64, f64)]) -> Vec<Coord<f64>> {
        points.iter().map(|&(x, y)| Coord { x, y }).collect()
    }

    #[rstest]
    fn single_closed_way_forms_a_polygon() {
        let outer = run(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0), (0.0, 0.0)]);
        let area = assemble_area(1, vec![(outer, RingRole::Outer)]).expect("area");
        assert_eq!(area.0.len(), 1);
    }

    #[rstest]
    fn split_ways_are_joined_even_when_reversed() {
        let first = run(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        let second = run(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        let area = assemble_area(
            2,
            vec![(first, RingRole::Outer), (second, RingRole::Outer)],
        )
        .expect("area");
        let polygon = area.0.first().expect("polygon");
        assert_eq!(polygon.exterior().0.len(), 5);
    }

    #[rstest]
    fn inner_rings_become_holes_of_their_container() {
        let west = run(&[(0.0, 0.0), (0.0, 4.0), (4.0, 4.0), (4.0, 0.0), (0.0, 0.0)]);
        let east = run(&[(10.0, 0.0), (10.0, 4.0), (14.0, 4.0), (14.0, 0.0), (10.0, 0.0)]);
        let hole = run(&[(11.0, 1.0), (11.0, 2.0), (12.0, 2.0), (12.0, 1.0), (11.0, 1.0)]);
        let area = assemble_area(
            3,
            vec![
                (west, RingRole::Outer),
                (east, RingRole::Outer),
                (hole, RingRole::Inner),
            ],
        )
        .expect("area");
        let holes: Vec<usize> = area.0.iter().map(|p| p.interiors().len()).collect();
        assert_eq!(holes, vec![0, 1]);
    }

    #[rstest]
    fn open_outer_rings_yield_nothing() {
        let open = run(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0)]);
        assert!(assemble_area(4, vec![(open, RingRole::Outer)]).is_none());
    }
}
