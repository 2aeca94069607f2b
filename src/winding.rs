use crate::error::NetworkError;
use crate::math::{admittance, INF};
use crate::relations::{equivalent_y_series, star2delta};
use num_complex::Complex64;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Transformer or machine winding connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    /// Solidly grounded wye.
    Yg,
    /// Wye grounded through an impedance.
    Yzn,
    /// Ungrounded wye.
    Y,
    /// Wye with an unconnected neutral terminal.
    Yn,
    /// Delta.
    D,
}

impl Connection {
    pub const ALL: [Connection; 5] = [
        Connection::Yg,
        Connection::Yzn,
        Connection::Y,
        Connection::Yn,
        Connection::D,
    ];

    pub fn role(self) -> WindingRole {
        match self {
            Connection::Yg | Connection::Yzn => WindingRole::Grounded,
            Connection::Y | Connection::Yn => WindingRole::Ungrounded,
            Connection::D => WindingRole::Delta,
        }
    }
}

impl FromStr for Connection {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Yg" => Ok(Connection::Yg),
            "Yzn" => Ok(Connection::Yzn),
            "Y" => Ok(Connection::Y),
            "Yn" => Ok(Connection::Yn),
            "D" => Ok(Connection::D),
            _ => Err(NetworkError::UnknownConnection(s.to_string())),
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Connection::Yg => "Yg",
            Connection::Yzn => "Yzn",
            Connection::Y => "Y",
            Connection::Yn => "Yn",
            Connection::D => "D",
        };
        write!(f, "{}", s)
    }
}

/// Zero-sequence behaviour of a winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindingRole {
    /// Conducts zero-sequence current to its own terminal.
    Grounded,
    /// Blocks zero-sequence current.
    Ungrounded,
    /// Circulates zero-sequence current, seen from the star as ground.
    Delta,
}

/// A winding connection with its neutral grounding admittance (pu).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Winding {
    connection: Connection,
    y_grounded: Complex64,
}

impl Winding {
    /// `zn_pu` is only used by `Yzn` windings. A zero grounding impedance
    /// is a solid ground.
    pub fn new(connection: Connection, zn_pu: Complex64) -> Self {
        let y_grounded = match connection {
            Connection::Yg => INF,
            Connection::Yzn => admittance(zn_pu),
            Connection::Y | Connection::Yn | Connection::D => Complex64::default(),
        };
        Self {
            connection,
            y_grounded,
        }
    }

    pub fn solid(connection: Connection) -> Self {
        Self::new(connection, Complex64::default())
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    pub fn role(&self) -> WindingRole {
        self.connection.role()
    }

    pub fn y_grounded(&self) -> Complex64 {
        self.y_grounded
    }

    /// Neutral admittance seen by zero-sequence current, three times the
    /// grounding admittance.
    pub fn neutral_path(&self) -> Complex64 {
        3.0 * self.y_grounded
    }

    /// Zero-sequence value of a star arm behind this winding. A grounded
    /// arm is in series with the neutral path; an ungrounded arm is open.
    pub fn zero_seq_arm(&self, arm: Complex64) -> Complex64 {
        match self.role() {
            WindingRole::Grounded => equivalent_y_series(arm, self.neutral_path()),
            WindingRole::Delta => arm,
            WindingRole::Ungrounded => Complex64::default(),
        }
    }
}

/// End of a zero-sequence branch, relative to the element's terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Terminal(usize),
    Ground,
}

/// One branch position of a zero-sequence template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTemplate {
    /// Star arms joined by the branch.
    pub arms: (usize, usize),
    /// Branch ends, or `None` when no zero-sequence path exists.
    pub ends: Option<(Node, Node)>,
}

/// Zero-sequence branch layout of a transformer for one combination of
/// winding roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seq0Template {
    pub branches: Vec<BranchTemplate>,
}

/// Branch positions of a 2-winding transformer: `mn`.
pub const POSITIONS_2W: [(usize, usize); 1] = [(0, 1)];

/// Branch positions of a 3-winding transformer: `mn`, `np`, `mp`.
pub const POSITIONS_3W: [(usize, usize); 3] = [(0, 1), (1, 2), (0, 2)];

const ROLES: [WindingRole; 3] = [
    WindingRole::Grounded,
    WindingRole::Ungrounded,
    WindingRole::Delta,
];

fn arm_end(role: WindingRole, arm: usize) -> Option<Node> {
    match role {
        WindingRole::Grounded => Some(Node::Terminal(arm)),
        WindingRole::Delta => Some(Node::Ground),
        WindingRole::Ungrounded => None,
    }
}

fn derive_template(roles: &[WindingRole], positions: &[(usize, usize)]) -> Seq0Template {
    let branches = positions
        .iter()
        .map(|&(i, j)| {
            let ends = match (arm_end(roles[i], i), arm_end(roles[j], j)) {
                (Some(Node::Ground), Some(Node::Ground)) => None,
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            };
            BranchTemplate { arms: (i, j), ends }
        })
        .collect();
    Seq0Template { branches }
}

static TEMPLATES_2W: Lazy<HashMap<(WindingRole, WindingRole), Seq0Template>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for &a in &ROLES {
        for &b in &ROLES {
            table.insert((a, b), derive_template(&[a, b], &POSITIONS_2W));
        }
    }
    table
});

static TEMPLATES_3W: Lazy<HashMap<(WindingRole, WindingRole, WindingRole), Seq0Template>> =
    Lazy::new(|| {
        let mut table = HashMap::new();
        for &a in &ROLES {
            for &b in &ROLES {
                for &c in &ROLES {
                    table.insert((a, b, c), derive_template(&[a, b, c], &POSITIONS_3W));
                }
            }
        }
        table
    });

pub fn template_2w(pri: WindingRole, sec: WindingRole) -> &'static Seq0Template {
    &TEMPLATES_2W[&(pri, sec)]
}

pub fn template_3w(pri: WindingRole, sec: WindingRole, ter: WindingRole) -> &'static Seq0Template {
    &TEMPLATES_3W[&(pri, sec, ter)]
}

/// Zero-sequence branch of one template position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seq0Branch {
    pub ends: Option<(Node, Node)>,
    pub y: Complex64,
}

/// Applies a template to the star arms `arms` of a transformer.
///
/// Each winding's arm is first replaced by its zero-sequence value, then
/// every branch position gets the star-to-delta admittance between the
/// arms it joins. Open arms drop out of the arm sum.
pub fn zero_seq_branches(
    template: &Seq0Template,
    windings: &[Winding],
    arms: &[Complex64],
) -> Vec<Seq0Branch> {
    let mut star = [Complex64::default(); 3];
    for (k, (w, &arm)) in windings.iter().zip(arms).enumerate() {
        star[k] = w.zero_seq_arm(arm);
    }
    let (y_01, y_12, y_02) = star2delta(star[0], star[1], star[2]);

    template
        .branches
        .iter()
        .map(|br| {
            let y = match br.ends {
                None => Complex64::default(),
                Some(_) => match br.arms {
                    (0, 1) | (1, 0) => y_01,
                    (1, 2) | (2, 1) => y_12,
                    _ => y_02,
                },
            };
            Seq0Branch { ends: br.ends, y }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::math::is_zero;
    use anyhow::Result;
    use approx::assert_abs_diff_eq;

    fn has_path(conn: &[Connection], i: usize, j: usize) -> bool {
        let grounded = |c: Connection| c.role() == WindingRole::Grounded;
        let active = |c: Connection| c.role() != WindingRole::Ungrounded;
        active(conn[i]) && active(conn[j]) && (grounded(conn[i]) || grounded(conn[j]))
    }

    #[test]
    fn test_parse_connection() -> Result<()> {
        for c in Connection::ALL {
            assert_eq!(c.to_string().parse::<Connection>()?, c);
        }
        let err = "Dyn11".parse::<Connection>();
        assert!(matches!(err, Err(NetworkError::UnknownConnection(_))));
        Ok(())
    }

    #[test]
    fn test_grounding() {
        assert!(Winding::solid(Connection::Yg).y_grounded().re.is_infinite());
        assert!(Winding::solid(Connection::Yzn).y_grounded().re.is_infinite());
        assert_eq!(
            Winding::new(Connection::Yzn, cmplx!(0.0, 0.5)).y_grounded(),
            cmplx!(0.0, -2.0)
        );
        assert_eq!(Winding::solid(Connection::Yn).y_grounded(), cmplx!());
    }

    #[test]
    fn test_two_winding_table() {
        let y = cmplx!(0.0, -10.0);
        for a in Connection::ALL {
            for b in Connection::ALL {
                let windings = [Winding::solid(a), Winding::solid(b)];
                let t = template_2w(a.role(), b.role());
                let br = zero_seq_branches(t, &windings, &[2.0 * y, 2.0 * y]);
                assert_eq!(br.len(), 1);

                let expected = match (a.role(), b.role()) {
                    (WindingRole::Grounded, WindingRole::Grounded) => {
                        Some((Node::Terminal(0), Node::Terminal(1)))
                    }
                    (WindingRole::Grounded, WindingRole::Delta) => {
                        Some((Node::Terminal(0), Node::Ground))
                    }
                    (WindingRole::Delta, WindingRole::Grounded) => {
                        Some((Node::Ground, Node::Terminal(1)))
                    }
                    _ => None,
                };
                assert_eq!(br[0].ends, expected, "{}-{}", a, b);
                match expected {
                    Some(_) => assert_abs_diff_eq!(br[0].y, y, epsilon = 1e-12),
                    None => assert!(is_zero(br[0].y)),
                }
            }
        }
    }

    #[test]
    fn test_two_winding_grounding_impedance() {
        let y = cmplx!(0.0, -10.0);
        let zn = cmplx!(0.0, 0.1);
        let windings = [Winding::new(Connection::Yzn, zn), Winding::solid(Connection::Yg)];
        let t = template_2w(WindingRole::Grounded, WindingRole::Grounded);
        let br = zero_seq_branches(t, &windings, &[2.0 * y, 2.0 * y]);

        let z_expected = y.inv() + zn / 3.0;
        assert_abs_diff_eq!(br[0].y, z_expected.inv(), epsilon = 1e-12);

        // Yzn-D with z = 0.1j: 0.05j + 0.05j + 0.1j / 3
        let windings = [Winding::new(Connection::Yzn, zn), Winding::solid(Connection::D)];
        let t = template_2w(WindingRole::Grounded, WindingRole::Delta);
        let br = zero_seq_branches(t, &windings, &[2.0 * y, 2.0 * y]);
        assert_eq!(br[0].ends, Some((Node::Terminal(0), Node::Ground)));
        assert_abs_diff_eq!(br[0].y, cmplx!(0.0, -7.5), epsilon = 1e-12);
    }

    #[test]
    fn test_three_winding_grounding_impedance() {
        // Yzn-Yg-D, zn = 0.1j: the primary arm -8j in series with -30j
        // becomes -120/19 j, and the arm sum is -291/19 j.
        let arms = [cmplx!(0.0, -8.0), cmplx!(0.0, -5.0), cmplx!(0.0, -4.0)];
        let windings = [
            Winding::new(Connection::Yzn, cmplx!(0.0, 0.1)),
            Winding::solid(Connection::Yg),
            Winding::solid(Connection::D),
        ];
        let t = template_3w(WindingRole::Grounded, WindingRole::Grounded, WindingRole::Delta);
        let br = zero_seq_branches(t, &windings, &arms);

        assert_eq!(br[0].ends, Some((Node::Terminal(0), Node::Terminal(1))));
        assert_eq!(br[1].ends, Some((Node::Terminal(1), Node::Ground)));
        assert_eq!(br[2].ends, Some((Node::Terminal(0), Node::Ground)));
        assert_abs_diff_eq!(br[0].y, cmplx!(0.0, -600.0 / 291.0), epsilon = 1e-12);
        assert_abs_diff_eq!(br[1].y, cmplx!(0.0, -380.0 / 291.0), epsilon = 1e-12);
        assert_abs_diff_eq!(br[2].y, cmplx!(0.0, -480.0 / 291.0), epsilon = 1e-12);
    }

    #[test]
    fn test_three_winding_table() {
        let arms = [cmplx!(0.0, -8.0), cmplx!(0.0, -5.0), cmplx!(0.0, -4.0)];
        for a in Connection::ALL {
            for b in Connection::ALL {
                for c in Connection::ALL {
                    let conn = [a, b, c];
                    let windings = conn.map(Winding::solid);
                    let t = template_3w(a.role(), b.role(), c.role());
                    let br = zero_seq_branches(t, &windings, &arms);
                    assert_eq!(br.len(), 3);

                    for (k, &(i, j)) in POSITIONS_3W.iter().enumerate() {
                        let label = format!("{}-{}-{} ({}, {})", a, b, c, i, j);
                        assert_eq!(br[k].ends.is_some(), has_path(&conn, i, j), "{}", label);
                        if let Some((e_i, e_j)) = br[k].ends {
                            let end = |w: usize, e: Node| match conn[w].role() {
                                WindingRole::Grounded => e == Node::Terminal(w),
                                _ => e == Node::Ground,
                            };
                            assert!(end(i, e_i) && end(j, e_j), "{}", label);
                            assert!(!is_zero(br[k].y), "{}", label);
                        } else {
                            assert!(is_zero(br[k].y), "{}", label);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_three_winding_yg_d_d() {
        // primary sees both delta arms in parallel behind its own arm
        let arms = [cmplx!(0.0, -8.0), cmplx!(0.0, -5.0), cmplx!(0.0, -4.0)];
        let windings = [
            Winding::solid(Connection::Yg),
            Winding::solid(Connection::D),
            Winding::solid(Connection::D),
        ];
        let t = template_3w(WindingRole::Grounded, WindingRole::Delta, WindingRole::Delta);
        let br = zero_seq_branches(t, &windings, &arms);

        let to_ground: Complex64 = br
            .iter()
            .filter(|b| b.ends == Some((Node::Terminal(0), Node::Ground)))
            .map(|b| b.y)
            .sum();
        let expected = equivalent_y_series(arms[0], arms[1] + arms[2]);
        assert_abs_diff_eq!(to_ground, expected, epsilon = 1e-12);
        assert_eq!(br[1].ends, None);
    }

    #[test]
    fn test_three_winding_single_ungrounded() {
        // Yg-Yg-Y: the open tertiary leaves the primary and secondary arms in series
        let arms = [cmplx!(0.0, -8.0), cmplx!(0.0, -5.0), cmplx!(0.0, -4.0)];
        let windings = [
            Winding::solid(Connection::Yg),
            Winding::solid(Connection::Yg),
            Winding::solid(Connection::Y),
        ];
        let t = template_3w(WindingRole::Grounded, WindingRole::Grounded, WindingRole::Ungrounded);
        let br = zero_seq_branches(t, &windings, &arms);

        assert_eq!(br[0].ends, Some((Node::Terminal(0), Node::Terminal(1))));
        assert_abs_diff_eq!(br[0].y, equivalent_y_series(arms[0], arms[1]), epsilon = 1e-12);
        assert_eq!(br[1].ends, None);
        assert_eq!(br[2].ends, None);
    }
}
