use anyhow::Result;
use clap::Parser;
use seqnet::debug::{format_incidence, format_mat};
use seqnet::{
    cmplx, Connection, Element, LineParams, MachineParams, Network, Sequence, ShuntParams,
    Transformer2WParamsBuilder, Winding,
};

/// Sequence network bus matrices of a demo short-circuit study.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Sequence network to print. All three when omitted.
    #[arg(long, value_enum)]
    seq: Option<Sequence>,

    /// Print complex values in polar form.
    #[arg(long, default_value_t = false)]
    polar: bool,

    /// Also print primitive and incidence matrices.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

/// Generator behind a step-up transformer feeding a load bus through two
/// parallel lines, with bases assigned from the 13.8 kV generator bus.
fn demo_network() -> Result<Network> {
    let mut net = Network::new(3, 100e6, 1, 13.8e3)?;
    let bases = net.bases_mut();

    let generator = Element::synchronous_generator(
        bases,
        &MachineParams {
            z_pu: [cmplx!(0.0, 0.05), cmplx!(0.0, 0.2), cmplx!(0.0, 0.2)],
            bus: 1,
            v_nom_kv: 13.8,
            s_nom_mva: 100.0,
            winding: Winding::solid(Connection::Yg),
        },
    )?;
    let transformer = Element::transformer_2w(
        bases,
        &Transformer2WParamsBuilder::default()
            .z_pu(cmplx!(0.0, 0.1))
            .bus_m(1usize)
            .bus_n(2usize)
            .v_nom_pri_kv(13.8)
            .v_nom_sec_kv(138.0)
            .s_nom_mva(100.0)
            .primary(Winding::solid(Connection::D))
            .secondary(Winding::solid(Connection::Yg))
            .phase_shift_deg(30.0)
            .build()?,
    )?;

    let z = cmplx!(0.05, 0.4);
    let line = LineParams {
        z_ohm_per_km: [3.0 * z, z, z],
        length_km: 40.0,
        bus_m: 2,
        bus_n: 3,
    };
    let lines = [
        Element::transmission_line(bases, &line)?,
        Element::transmission_line(bases, &line)?,
    ];
    let load = Element::shunt(
        bases,
        &ShuntParams {
            y_siemens: [cmplx!(2.5e-3, -0.8e-3); 3],
            bus: 3,
        },
    )?;

    let mut elements = vec![generator, transformer];
    elements.extend(lines);
    elements.push(load);
    net.add_elements(elements)?;
    net.assign_bases()?;
    Ok(net)
}

fn execute(cli: &Cli) -> Result<()> {
    let mut net = demo_network()?;

    let sequences = match cli.seq {
        Some(seq) => vec![seq],
        None => Sequence::ALL.to_vec(),
    };
    for seq in sequences {
        net.assemble(seq)?;

        println!("{} ({} branches)", seq, net.number_of_branches(seq)?);
        if cli.verbose {
            if let Some(y_prim) = net.y_prim(seq) {
                println!("Yprim:\n{}\n", format_mat(y_prim, cli.polar));
            }
            if let Some(a) = net.incidence(seq) {
                println!("A:\n{}\n", format_incidence(a));
            }
        }
        if let Some(y_bus) = net.y_bus(seq) {
            println!("Ybus:\n{}\n", format_mat(y_bus, cli.polar));
        }
        if let Some(z_bus) = net.z_bus(seq) {
            println!("Zbus:\n{}\n", format_mat(z_bus, cli.polar));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_demo_network_bases() -> Result<()> {
        let mut net = demo_network()?;
        assert_relative_eq!(net.bases().get(1)?.v_base(), 13.8e3);
        assert_relative_eq!(net.bases().get(2)?.v_base(), 138e3, max_relative = 1e-12);
        assert_relative_eq!(net.bases().get(3)?.v_base(), 138e3, max_relative = 1e-12);

        net.assemble_all()?;
        for seq in Sequence::ALL {
            assert!(net.z_bus(seq).is_some());
        }
        Ok(())
    }
}
