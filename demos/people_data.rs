// The People data set: twelve measurements on 32 people, shared by the demo and
// the integration tests.
#![allow(dead_code)]

use mvanalysis::Dataset;

pub const PEOPLE_VARIABLES: [&str; 12] = [
    "Height", "Weight", "Hairlength", "Shoesize", "Age", "Income", "Beer", "Wine", "Sex", "Swim",
    "Region", "IQ",
];

pub const PEOPLE_OBJECTS: [&str; 32] = [
    "Lars", "Peter", "Rasmus", "Lene", "Mette", "Gitte", "Jens", "Erik", "Lotte", "Heidi", "Kaj",
    "Gerda", "Anne", "Britta", "Magnus", "Casper", "Luka", "Federico", "Dona", "Fabrizia", "Lisa",
    "Benito", "Franko", "Alessandro", "Leonora", "Giuliana", "Giovanni", "Leonardo", "Marta",
    "Rosetta", "Romeo", "Romina",
];

/// Twelve measurements on 32 people, stored one row per variable.
pub fn people() -> Dataset {
    let rows: Vec<Vec<f64>> = vec![
        vec![198., 184., 183., 166., 170., 172., 182., 180., 169., 168., 183., 157., 164., 162., 180., 180., 185., 187., 168., 166., 158., 177., 180., 181., 163., 162., 176., 175., 165., 161., 178., 160.],
        vec![92., 84., 83., 47., 60., 64., 80., 80., 51., 52., 81., 47., 50., 49., 82., 81., 82., 84., 50., 49., 46., 65., 72., 75., 50., 50., 68., 67., 51., 48., 75., 48.],
        vec![-1., -1., -1., -1., 1., 1., -1., -1., 1., 1., -1., 1., 1., 1., -1., -1., -1., -1., 1., 1., 1., -1., -1., -1., 1., 1., -1., 1., 1., 1., -1., 1.],
        vec![48., 44., 44., 36., 38., 39., 42., 43., 36., 37., 42., 36., 38., 37., 44., 44., 45., 46., 37., 36., 34., 41., 43., 43., 36., 36., 42., 42., 36., 35., 42., 35.],
        vec![48., 33., 37., 32., 23., 24., 35., 36., 24., 27., 37., 32., 41., 40., 43., 46., 26., 27., 49., 21., 30., 26., 33., 42., 18., 20., 50., 55., 36., 41., 30., 40.],
        vec![45000., 33000., 34000., 28000., 20000., 22000., 30000., 30000., 23000., 23500., 35000., 32000., 34000., 34000., 37000., 42000., 16000., 16500., 34000., 14000., 18000., 18000., 19000., 31000., 11000., 11500., 36000., 38000., 26000., 31500., 24000., 31000.],
        vec![420., 350., 320., 270., 312., 308., 398., 388., 250., 260., 345., 235., 255., 265., 355., 362., 295., 299., 170., 150., 120., 209., 236., 198., 143., 133., 195., 185., 121., 116., 203., 118.],
        vec![115., 102., 98., 78., 99., 91., 65., 63., 89., 86., 45., 92., 134., 124., 82., 90., 180., 178., 162., 245., 120., 160., 175., 161., 136., 146., 177., 187., 129., 196., 208., 198.],
        vec![-1., -1., -1., 1., 1., 1., -1., -1., 1., 1., -1., 1., 1., 1., -1., -1., -1., -1., 1., 1., 1., -1., -1., -1., 1., 1., -1., -1., 1., 1., -1., 1.],
        vec![98., 92., 91., 75., 81., 82., 85., 84., 78., 78., 90., 70., 76., 75., 88., 86., 92., 95., 76., 75., 70., 86., 85., 83., 75., 74., 82., 80., 76., 75., 81., 74.],
        vec![-1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., -1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1., 1.],
        vec![100., 130., 127., 112., 110., 102., 140., 129., 98., 100., 105., 127., 101., 108., 109., 113., 109., 119., 135., 123., 119., 120., 115., 105., 102., 132., 96., 105., 126., 120., 118., 129.],
    ];

    Dataset::from_rows(rows)
        .expect("people data is rectangular")
        .with_var_names(PEOPLE_VARIABLES)
        .with_obj_names(PEOPLE_OBJECTS)
        .with_name("People")
        .with_var_axis("Variable #", None)
        .with_obj_axis("Person #", None)
}
