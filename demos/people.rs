// Runs PCA and MLR on the People data and prints the results.
//
//     RUST_LOG=info cargo run --example people

mod people_data;

use mvanalysis::{CrossValidation, MlrConfig, MlrModel, Model, PcaConfig, PcaModel, Selector};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    // continuous measurements only; the coded variables (Sex, Region, ...) are left out
    let data = people_data::people().subset(
        ["Height", "Weight", "Shoesize", "Age", "Beer", "IQ"],
        Selector::All,
    )?;

    let mut pca = PcaModel::new(PcaConfig::new(3).with_cv(CrossValidation::full()));
    pca.calibrate(&data, None)?;
    if let Some(res) = pca.calres() {
        println!("PCA explained variance (calibration):");
        for (i, (ind, cum)) in res
            .individual_variance()
            .iter()
            .zip(res.cumulative_variance().iter())
            .enumerate()
        {
            println!("  Comp {}: {:6.2}% ({:6.2}% cumulative)", i + 1, ind, cum);
        }
    }
    if let Some(cv) = pca.cvres() {
        println!("PCA cumulative variance (leave-one-out): {:?}", cv.cumulative_variance().to_vec());
    }

    let x = data.subset(["Height", "Shoesize"], Selector::All)?;
    let y = data.subset("Weight", Selector::All)?;
    let mut mlr = MlrModel::new(MlrConfig::default().with_cv(CrossValidation::venetian(4)));
    mlr.calibrate(&x, Some(&y))?;

    if let Some(coeffs) = mlr.coefficients() {
        for (name, b) in coeffs.obj_names().iter().zip(coeffs.values().iter()) {
            println!("MLR coefficient for {}: {:.4}", name, b);
        }
    }
    let summary = mlr.summary()?;
    for (j, label) in summary.obj_names().iter().enumerate() {
        let stats = summary.values().column(j);
        println!(
            "{:>3}: bias = {:8.4}, R2 = {:.4}, RMSE = {:.4}",
            label, stats[0], stats[1], stats[2]
        );
    }
    Ok(())
}
